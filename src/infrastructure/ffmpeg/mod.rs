// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` adapters implementing the pipeline port traits.
//!
//! [`FfmpegBackend`] is the production [`MediaBackend`]: every stage it hands
//! out registers with the backend's [`ResourceTracker`], so a closed session
//! can be checked for leaked native handles.
//!
//! # Thread Safety
//!
//! Scaler, resampler and encoder contexts are raw pointers without `Send`.
//! The adapters wrapping them are `Send` but not `Sync`: each is owned by one
//! thread at a time.

mod decoder;
mod hwaccel;
mod recorder;
mod resampler;
mod scaler;
mod source;

use std::path::Path;
use std::sync::OnceLock;

pub use decoder::{FfmpegDecoder, FfmpegFrame};
pub use recorder::FfmpegRecorder;
pub use resampler::FfmpegAudioResampler;
pub use scaler::FfmpegVideoConverter;
pub use source::{FfmpegPacket, FfmpegSource};

use crate::application::port::{MediaBackend, RecordingInput};
use crate::diagnostics::ResourceTracker;
use crate::domain::media::{AudioTarget, HwAccel, RecordingSettings, StreamDescriptor, VideoTarget};
use crate::error::{Error, Result};

static FFMPEG_INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Initializes `FFmpeg` once per process.
///
/// Library log output is limited to errors; the crate reports through
/// `tracing` instead.
///
/// # Errors
///
/// Returns [`Error::Open`] if library initialization failed. The failure is
/// remembered and returned to every later caller.
pub fn ensure_initialized() -> Result<()> {
    FFMPEG_INIT
        .get_or_init(|| {
            ffmpeg_next::init().map_err(|e| format!("FFmpeg initialization failed: {e}"))?;
            ffmpeg_next::format::network::init();

            // SAFETY: av_log_set_level is thread-safe and only affects logging
            unsafe {
                ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
            }
            tracing::debug!("FFmpeg initialized");
            Ok(())
        })
        .clone()
        .map_err(Error::Open)
}

/// Production backend built on `FFmpeg`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    tracker: ResourceTracker,
}

impl FfmpegBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend reporting into an existing tracker.
    #[must_use]
    pub fn with_tracker(tracker: ResourceTracker) -> Self {
        Self { tracker }
    }

    #[must_use]
    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }
}

impl MediaBackend for FfmpegBackend {
    type Packet = FfmpegPacket;
    type Frame = FfmpegFrame;
    type Source = FfmpegSource;
    type Decoder = FfmpegDecoder;
    type VideoConverter = FfmpegVideoConverter;
    type AudioResampler = FfmpegAudioResampler;
    type Recorder = FfmpegRecorder;

    fn open_source(&self, url: &str) -> Result<FfmpegSource> {
        FfmpegSource::open(url, &self.tracker)
    }

    fn open_decoder(
        &self,
        source: &FfmpegSource,
        descriptor: &StreamDescriptor,
        hw_accel: &HwAccel,
    ) -> Result<FfmpegDecoder> {
        FfmpegDecoder::open(source, descriptor, hw_accel, &self.tracker)
    }

    fn video_converter(
        &self,
        descriptor: &StreamDescriptor,
        target: VideoTarget,
    ) -> Result<FfmpegVideoConverter> {
        FfmpegVideoConverter::new(descriptor, target, &self.tracker)
    }

    fn audio_resampler(
        &self,
        descriptor: &StreamDescriptor,
        target: AudioTarget,
    ) -> Result<FfmpegAudioResampler> {
        FfmpegAudioResampler::new(descriptor, target, &self.tracker)
    }

    fn start_recording(
        &self,
        path: &Path,
        input: RecordingInput,
        settings: &RecordingSettings,
    ) -> Result<FfmpegRecorder> {
        FfmpegRecorder::start(path, input, settings, &self.tracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ResourceKind;

    #[test]
    fn initialization_is_idempotent() {
        assert!(ensure_initialized().is_ok());
        assert!(ensure_initialized().is_ok());
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let backend = FfmpegBackend::new();
        let result = backend.open_source("/nonexistent/definitely-missing.mp4");
        assert!(matches!(result, Err(Error::Open(_))));
        assert_eq!(backend.tracker().live(ResourceKind::Source), 0);
    }

    #[test]
    fn backends_can_share_a_tracker() {
        let tracker = ResourceTracker::new();
        let backend = FfmpegBackend::with_tracker(tracker.clone());
        let _ = backend.open_source("/nonexistent/file.mkv");
        assert_eq!(tracker.live_total(), 0);
    }
}
