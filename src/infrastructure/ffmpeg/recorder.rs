// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` encoder adapter implementing [`VideoRecorder`].
//!
//! Converted frames are copied into a staging frame, scaled to YUV 4:2:0 and
//! encoded with H.264 (MPEG-4 Part 2 when no H.264 encoder is built in). The
//! encoder timestamp is a frame counter, so the output plays at the configured
//! frame rate whatever the source timing was.

use std::path::{Path, PathBuf};

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::{codec, encoder, ffi, format, frame, Dictionary, Packet, Rational};

use super::ensure_initialized;
use super::scaler::native_pixel;
use crate::application::port::{RecordingInput, VideoRecorder};
use crate::diagnostics::{ResourceGuard, ResourceKind, ResourceTracker};
use crate::domain::media::{RecordingSettings, VideoFrameView};
use crate::error::{Error, Result};

const ENCODED_PIXEL: Pixel = Pixel::YUV420P;

fn recording_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Recording(format!("{context}: {err}"))
}

/// EAGAIN and EOF end a drain; anything else is a real encoder failure.
fn is_drained(err: &ffmpeg_next::Error) -> bool {
    match err {
        ffmpeg_next::Error::Eof => true,
        ffmpeg_next::Error::Other { errno } => *errno == ffmpeg_next::error::EAGAIN,
        _ => false,
    }
}

/// Open encoder plus output container.
pub struct FfmpegRecorder {
    output: format::context::Output,
    encoder: encoder::Video,
    scaler: scaling::Context,
    /// Input frames are copied here so the scaler sees FFmpeg-owned planes.
    staging: frame::Video,
    encoded: frame::Video,
    stream_index: usize,
    encoder_time_base: Rational,
    input: RecordingInput,
    row_bytes: usize,
    frames: u64,
    /// Result of the one finalize attempt, replayed by later calls.
    outcome: Option<Result<u64>>,
    path: PathBuf,
    _guard: ResourceGuard,
}

// SAFETY: the format, codec and scaler contexts are only touched through
// `&mut self`; the recorder moves between threads as a whole.
unsafe impl Send for FfmpegRecorder {}

impl FfmpegRecorder {
    /// Creates `path`, opens the encoder and writes the container header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recording`] if the container, encoder or scaler cannot
    /// be set up.
    #[allow(clippy::cast_possible_wrap)]
    pub fn start(
        path: &Path,
        input: RecordingInput,
        settings: &RecordingSettings,
        tracker: &ResourceTracker,
    ) -> Result<Self> {
        ensure_initialized()?;

        let Some(bytes_per_pixel) = input.format.packed_bytes_per_pixel() else {
            return Err(Error::Recording(format!(
                "recording input must be packed, got {}",
                input.format
            )));
        };
        // 4:2:0 chroma needs even dimensions
        let width = input.width & !1;
        let height = input.height & !1;
        if width == 0 || height == 0 || settings.frame_rate == 0 {
            return Err(Error::Recording(format!(
                "cannot record {}x{} at {} fps",
                input.width, input.height, settings.frame_rate
            )));
        }

        let mut output =
            format::output(&path).map_err(|e| recording_error(&path.display().to_string(), e))?;
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let codec = encoder::find(codec::Id::H264)
            .or_else(|| encoder::find(codec::Id::MPEG4))
            .ok_or_else(|| Error::Recording("no H.264 or MPEG-4 encoder available".into()))?;
        let is_h264 = codec.id() == codec::Id::H264;

        let time_base = Rational::new(1, settings.frame_rate as i32);
        let mut ost = output
            .add_stream(codec)
            .map_err(|e| recording_error("failed to add stream", e))?;
        let stream_index = ost.index();

        let mut setup = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| recording_error("failed to create encoder", e))?;
        setup.set_width(width);
        setup.set_height(height);
        setup.set_format(ENCODED_PIXEL);
        setup.set_time_base(time_base);
        setup.set_frame_rate(Some(Rational::new(settings.frame_rate as i32, 1)));
        setup.set_gop(settings.keyframe_interval.max(1));
        if global_header {
            setup.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut options = Dictionary::new();
        if is_h264 {
            options.set("preset", &settings.preset);
        }
        let encoder = setup
            .open_with(options)
            .map_err(|e| recording_error("failed to open encoder", e))?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);

        output
            .write_header()
            .map_err(|e| recording_error("failed to write header", e))?;

        let source_pixel = native_pixel(input.format);
        let scaler = scaling::Context::get(
            source_pixel,
            input.width,
            input.height,
            ENCODED_PIXEL,
            width,
            height,
            scaling::Flags::FAST_BILINEAR,
        )
        .map_err(|e| recording_error("failed to create scaler", e))?;

        tracing::info!(
            path = %path.display(),
            codec = if is_h264 { "h264" } else { "mpeg4" },
            width,
            height,
            fps = settings.frame_rate,
            "recording started"
        );

        Ok(Self {
            output,
            encoder_time_base: time_base,
            encoder,
            scaler,
            staging: frame::Video::new(source_pixel, input.width, input.height),
            encoded: frame::Video::new(ENCODED_PIXEL, width, height),
            stream_index,
            input,
            row_bytes: input.width as usize * bytes_per_pixel,
            frames: 0,
            outcome: None,
            path: path.to_path_buf(),
            _guard: tracker.acquire(ResourceKind::Recorder),
        })
    }

    /// Destination file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stage(&mut self, view: &VideoFrameView<'_>) -> Result<()> {
        if view.width != self.input.width
            || view.height != self.input.height
            || view.format != self.input.format
        {
            return Err(Error::Recording(format!(
                "frame is {}x{} {}, recorder expects {}x{} {}",
                view.width,
                view.height,
                view.format,
                self.input.width,
                self.input.height,
                self.input.format
            )));
        }
        let stride = self.staging.stride(0);
        let row_bytes = self.row_bytes;
        let plane = self.staging.data_mut(0);
        for y in 0..view.height {
            let row = view
                .row(y)
                .ok_or_else(|| Error::Recording(format!("frame row {y} is truncated")))?;
            let start = y as usize * stride;
            plane[start..start + row_bytes].copy_from_slice(row);
        }
        Ok(())
    }

    fn drain_packets(&mut self) -> Result<()> {
        let stream_time_base = self
            .output
            .stream(self.stream_index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| Error::Recording("output stream disappeared".into()))?;

        let mut packet = Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {}
                Err(e) if is_drained(&e) => return Ok(()),
                Err(e) => return Err(recording_error("encoder failed", e)),
            }
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| recording_error("failed to write packet", e))?;
        }
    }

    /// Flushes the encoder and writes the trailer. The trailer is attempted
    /// even when the flush fails.
    fn finalize(&mut self) -> Result<()> {
        let flushed = match self.encoder.send_eof() {
            Ok(()) | Err(ffmpeg_next::Error::Eof) => self.drain_packets(),
            Err(e) => Err(recording_error("failed to flush encoder", e)),
        };
        let trailer = self
            .output
            .write_trailer()
            .map_err(|e| recording_error("failed to write trailer", e));
        flushed.and(trailer)
    }
}

impl VideoRecorder for FfmpegRecorder {
    #[allow(clippy::cast_possible_wrap)]
    fn encode_frame(&mut self, frame: &VideoFrameView<'_>) -> Result<()> {
        if self.outcome.is_some() {
            return Err(Error::Recording("recording already finished".into()));
        }
        self.stage(frame)?;

        // SAFETY: the frame was allocated by us; the encoder may still hold a
        // reference to the previous buffers, in which case FFmpeg reallocates.
        let ret = unsafe { ffi::av_frame_make_writable(self.encoded.as_mut_ptr()) };
        if ret < 0 {
            return Err(recording_error(
                "encoder frame not writable",
                ffmpeg_next::Error::from(ret),
            ));
        }
        self.scaler
            .run(&self.staging, &mut self.encoded)
            .map_err(|e| recording_error("color conversion failed", e))?;

        self.encoded.set_pts(Some(self.frames as i64));
        self.encoder
            .send_frame(&self.encoded)
            .map_err(|e| recording_error("encoder rejected frame", e))?;
        self.frames += 1;
        self.drain_packets()
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(&mut self) -> Result<u64> {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        // One attempt only: a failed trailer cannot be written again
        let outcome = self.finalize().map(|()| self.frames);
        match &outcome {
            Ok(frames) => {
                tracing::info!(path = %self.path.display(), frames, "recording finished");
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "recording not finalized cleanly");
            }
        }
        self.outcome = Some(outcome.clone());
        outcome
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            // Failures are logged by finish
            let _ = self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::PixelFormat;
    use crate::test_utils::solid_frame;

    #[test]
    fn planar_input_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tracker = ResourceTracker::new();
        let input = RecordingInput {
            width: 64,
            height: 64,
            format: PixelFormat::Yuv420p,
        };
        let result = FfmpegRecorder::start(
            &dir.path().join("out.mp4"),
            input,
            &RecordingSettings::default(),
            &tracker,
        );
        assert!(matches!(result, Err(Error::Recording(_))));
        assert_eq!(tracker.live_total(), 0);
    }

    #[test]
    fn degenerate_size_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tracker = ResourceTracker::new();
        let input = RecordingInput {
            width: 1,
            height: 64,
            format: PixelFormat::Bgra,
        };
        let result = FfmpegRecorder::start(
            &dir.path().join("out.mp4"),
            input,
            &RecordingSettings::default(),
            &tracker,
        );
        assert!(matches!(result, Err(Error::Recording(_))));
    }

    #[test]
    fn records_solid_frames_and_finishes_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("solid.mp4");
        let tracker = ResourceTracker::new();
        let input = RecordingInput {
            width: 64,
            height: 48,
            format: PixelFormat::Bgra,
        };
        let Ok(mut recorder) =
            FfmpegRecorder::start(&path, input, &RecordingSettings::default(), &tracker)
        else {
            eprintln!("Skipping test: no video encoder available");
            return;
        };

        let frame = solid_frame(64, 48, PixelFormat::Bgra, 0x80);
        let view = frame.as_view();
        for _ in 0..10 {
            recorder.encode_frame(&view).expect("encode");
        }
        assert_eq!(recorder.frames_written(), 10);
        assert_eq!(recorder.finish().expect("finish"), 10);
        assert_eq!(recorder.finish().expect("second finish"), 10);
        assert!(recorder.encode_frame(&view).is_err());
        drop(recorder);

        assert_eq!(tracker.live(ResourceKind::Recorder), 0);
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        assert!(size > 0);
    }

    #[test]
    fn drain_stops_only_on_again_or_eof() {
        assert!(is_drained(&ffmpeg_next::Error::Eof));
        assert!(is_drained(&ffmpeg_next::Error::Other {
            errno: ffmpeg_next::error::EAGAIN
        }));
        assert!(!is_drained(&ffmpeg_next::Error::InvalidData));
        assert!(!is_drained(&ffmpeg_next::Error::Bug));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_finalize_is_reported_on_every_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("full.mp4");
        // Writes succeed until the buffer is flushed, then fail with ENOSPC
        std::os::unix::fs::symlink("/dev/full", &path).expect("symlink");
        let tracker = ResourceTracker::new();
        let input = RecordingInput {
            width: 64,
            height: 48,
            format: PixelFormat::Bgra,
        };
        let mut recorder =
            match FfmpegRecorder::start(&path, input, &RecordingSettings::default(), &tracker) {
                Ok(recorder) => recorder,
                Err(e) => {
                    eprintln!("Skipping test: {e}");
                    return;
                }
            };

        let frame = solid_frame(64, 48, PixelFormat::Bgra, 0x40);
        for _ in 0..3 {
            let _ = recorder.encode_frame(&frame.as_view());
        }
        assert!(matches!(recorder.finish(), Err(Error::Recording(_))));
        assert!(matches!(recorder.finish(), Err(Error::Recording(_))));
        drop(recorder);
        assert_eq!(tracker.live(ResourceKind::Recorder), 0);
    }
}
