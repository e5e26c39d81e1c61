// SPDX-License-Identifier: MPL-2.0
//! Fixed conversion targets chosen when a session is opened.

use super::types::{PixelFormat, SampleFormat};

/// Target shape of converted video frames.
///
/// A zero width or height means "keep the source dimension".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoTarget {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl VideoTarget {
    /// Resolves zero dimensions against the source size.
    #[must_use]
    pub fn resolve(self, source_width: u32, source_height: u32) -> Self {
        Self {
            width: if self.width == 0 { source_width } else { self.width },
            height: if self.height == 0 { source_height } else { self.height },
            format: self.format,
        }
    }
}

/// Target shape of resampled audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTarget {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

impl Default for AudioTarget {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            format: SampleFormat::S16,
        }
    }
}

/// Encoder settings for the recording sub-pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSettings {
    pub frame_rate: u32,
    /// Maximum number of frames between keyframes.
    pub keyframe_interval: u32,
    /// Encoder speed preset, passed through when the codec understands it.
    pub preset: String,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            frame_rate: 25,
            keyframe_interval: 25,
            preset: "ultrafast".to_string(),
        }
    }
}
