// SPDX-License-Identifier: MPL-2.0
//! Converted frame views and their owned copies.
//!
//! Converters write into buffers they own and hand out borrowed views. A view
//! is only valid until the next `convert` call on the same converter, which the
//! borrow checker enforces. Anything that must outlive that window (another
//! thread, a cache, a screenshot taken later) calls `to_owned_*` first.

use super::types::{PixelFormat, SampleFormat, TimeBase};
use std::sync::Arc;

/// Borrowed view of a packed video frame in a converter's output buffer.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrameView<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Bytes per row in `data`.
    pub stride: usize,
    pub format: PixelFormat,
    /// Presentation timestamp inherited from the decoded frame.
    pub pts: Option<i64>,
    pub time_base: TimeBase,
}

impl VideoFrameView<'_> {
    /// Presentation time in seconds, if the frame carried a timestamp.
    #[must_use]
    pub fn pts_secs(&self) -> Option<f64> {
        self.pts.map(|pts| self.time_base.seconds(pts))
    }

    /// Returns one row of pixels without the stride padding.
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let bpp = self.format.packed_bytes_per_pixel()?;
        let start = y as usize * self.stride;
        let end = start + self.width as usize * bpp;
        if y >= self.height || end > self.data.len() {
            return None;
        }
        Some(&self.data[start..end])
    }

    /// Copies the frame into caller-owned storage.
    #[must_use]
    pub fn to_owned_frame(&self) -> OwnedVideoFrame {
        OwnedVideoFrame {
            data: Arc::new(self.data.to_vec()),
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
            pts: self.pts,
            time_base: self.time_base,
        }
    }
}

/// Owned copy of a converted video frame.
///
/// Uses `Arc<Vec<u8>>` so the copy can be shared between consumers without
/// cloning pixel data again.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedVideoFrame {
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
    pub pts: Option<i64>,
    pub time_base: TimeBase,
}

impl OwnedVideoFrame {
    /// Borrows the copy as a view, e.g. to feed it to a recorder.
    #[must_use]
    pub fn as_view(&self) -> VideoFrameView<'_> {
        VideoFrameView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
            pts: self.pts,
            time_base: self.time_base,
        }
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn pts_secs(&self) -> Option<f64> {
        self.pts.map(|pts| self.time_base.seconds(pts))
    }
}

/// Borrowed view of interleaved audio in a resampler's output buffer.
#[derive(Debug, Clone, Copy)]
pub struct AudioSamples<'a> {
    pub data: &'a [u8],
    pub channels: u16,
    pub sample_rate: u32,
    pub format: SampleFormat,
    /// Samples per channel contained in `data`.
    pub frames: usize,
    pub pts: Option<i64>,
    pub time_base: TimeBase,
}

impl AudioSamples<'_> {
    /// Duration of the buffer in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / f64::from(self.sample_rate)
    }

    #[must_use]
    pub fn to_owned_samples(&self) -> OwnedAudioSamples {
        OwnedAudioSamples {
            data: Arc::new(self.data.to_vec()),
            channels: self.channels,
            sample_rate: self.sample_rate,
            format: self.format,
            frames: self.frames,
            pts: self.pts,
            time_base: self.time_base,
        }
    }
}

/// Owned copy of resampled audio.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedAudioSamples {
    pub data: Arc<Vec<u8>>,
    pub channels: u16,
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub frames: usize,
    pub pts: Option<i64>,
    pub time_base: TimeBase,
}

impl OwnedAudioSamples {
    #[must_use]
    pub fn as_samples(&self) -> AudioSamples<'_> {
        AudioSamples {
            data: &self.data,
            channels: self.channels,
            sample_rate: self.sample_rate,
            format: self.format,
            frames: self.frames,
            pts: self.pts,
            time_base: self.time_base,
        }
    }
}
