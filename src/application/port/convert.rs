// SPDX-License-Identifier: MPL-2.0
//! Frame conversion ports.
//!
//! Both converters own their output buffer and return borrowed views into it.
//! The view is valid until the next `convert` call.

use crate::domain::media::{AudioSamples, AudioTarget, VideoFrameView, VideoTarget};
use crate::error::Result;

/// Converts decoded video frames to a fixed host pixel format and size.
pub trait VideoConverter: Send {
    type Frame;

    /// Resolved target (source dimensions already substituted for zeros).
    fn target(&self) -> VideoTarget;

    /// Converts one decoded frame, moving it to host memory first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Convert`](crate::error::Error::Convert) when scaling
    /// fails. The caller should skip the frame.
    fn convert(&mut self, frame: &Self::Frame) -> Result<VideoFrameView<'_>>;

    /// The most recent successful conversion, if any.
    fn last_output(&self) -> Option<VideoFrameView<'_>>;
}

/// Converts decoded audio to a fixed interleaved sample format, rate and layout.
pub trait AudioResampler: Send {
    type Frame;

    fn target(&self) -> AudioTarget;

    /// Converts one decoded frame.
    ///
    /// `source_rate_hint` is used when the frame does not report its own rate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Convert`](crate::error::Error::Convert) when the
    /// converted sample count does not fit the declared output.
    fn convert(&mut self, frame: &Self::Frame, source_rate_hint: u32) -> Result<AudioSamples<'_>>;
}
