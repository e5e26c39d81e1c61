// SPDX-License-Identifier: MPL-2.0
//! Shared test helpers.
//!
//! Float comparisons go through the `approx` macros re-exported here, since
//! `assert_eq!` on progress fractions and durations is too brittle.

pub use approx::assert_abs_diff_eq;

use std::sync::Arc;

use crate::domain::media::{OwnedVideoFrame, PixelFormat, TimeBase};

/// Tightly packed frame filled with `value`.
///
/// # Panics
///
/// Panics if `format` is planar.
pub fn solid_frame(width: u32, height: u32, format: PixelFormat, value: u8) -> OwnedVideoFrame {
    let bytes_per_pixel = format
        .packed_bytes_per_pixel()
        .expect("solid frames need a packed format");
    let stride = width as usize * bytes_per_pixel;
    OwnedVideoFrame {
        data: Arc::new(vec![value; stride * height as usize]),
        width,
        height,
        stride,
        format,
        pts: None,
        time_base: TimeBase::new(1, 25),
    }
}
