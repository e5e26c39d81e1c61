// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` software scaler implementing [`VideoConverter`].

use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame;
use ffmpeg_next::software::scaling;

use super::decoder::FfmpegFrame;
use super::hwaccel;
use crate::application::port::VideoConverter;
use crate::diagnostics::{ResourceGuard, ResourceKind, ResourceTracker};
use crate::domain::media::{PixelFormat, StreamDescriptor, TimeBase, VideoFrameView, VideoTarget};
use crate::error::{Error, Result};

/// Maps a host pixel format to the native one.
pub(super) fn native_pixel(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Bgra => Pixel::BGRA,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Yuv420p => Pixel::YUV420P,
    }
}

/// Tight (alignment 1) image size for a format, as computed by libavutil.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub(super) fn image_buffer_size(format: Pixel, width: u32, height: u32) -> Result<usize> {
    // SAFETY: pure computation on plain values.
    let size = unsafe { ffi::av_image_get_buffer_size(format.into(), width as i32, height as i32, 1) };
    if size <= 0 {
        return Err(Error::Convert(format!(
            "invalid image size {width}x{height} for {format:?}"
        )));
    }
    Ok(size as usize)
}

/// Scaler keyed on the source shape it was built for.
struct ScalerSlot {
    context: scaling::Context,
    source: (Pixel, u32, u32),
}

/// Converts decoded frames to a packed host format at a fixed size.
///
/// The target is fixed at construction. A change of *source* format or size
/// rebuilds the scaler but keeps the output buffer.
pub struct FfmpegVideoConverter {
    target: VideoTarget,
    target_pixel: Pixel,
    time_base: TimeBase,
    scaler: Option<ScalerSlot>,
    /// Scaler output, allocated once with FFmpeg's row alignment.
    scaled: frame::Video,
    /// Tightly packed copy handed out as views.
    packed: Vec<u8>,
    row_bytes: usize,
    last_pts: Option<i64>,
    has_output: bool,
    _guard: ResourceGuard,
}

// SAFETY: FfmpegVideoConverter holds an SwsContext behind a raw pointer.
// It is only ever used from one thread at a time (it moves into the playback
// thread and back), and FFmpeg keeps no thread-local state for it.
unsafe impl Send for FfmpegVideoConverter {}

impl FfmpegVideoConverter {
    pub fn new(
        descriptor: &StreamDescriptor,
        target: VideoTarget,
        tracker: &ResourceTracker,
    ) -> Result<Self> {
        let video = descriptor
            .video()
            .ok_or_else(|| Error::InvalidArgument("video converter needs a video stream".into()))?;
        let Some(bytes_per_pixel) = target.format.packed_bytes_per_pixel() else {
            return Err(Error::UnsupportedFormat(format!(
                "converter target must be packed, got {}",
                target.format
            )));
        };

        let target = target.resolve(video.width, video.height);
        if target.width == 0 || target.height == 0 {
            return Err(Error::Convert(format!(
                "stream {} reports no frame size",
                descriptor.index
            )));
        }

        let target_pixel = native_pixel(target.format);
        let size = image_buffer_size(target_pixel, target.width, target.height)?;

        tracing::debug!(
            source = %video.pixel_format,
            width = target.width,
            height = target.height,
            format = %target.format,
            "video converter created"
        );

        Ok(Self {
            target,
            target_pixel,
            time_base: descriptor.time_base,
            scaler: None,
            scaled: frame::Video::new(target_pixel, target.width, target.height),
            packed: vec![0; size],
            row_bytes: target.width as usize * bytes_per_pixel,
            last_pts: None,
            has_output: false,
            _guard: tracker.acquire(ResourceKind::VideoConverter),
        })
    }

    fn view(&self) -> VideoFrameView<'_> {
        VideoFrameView {
            data: &self.packed,
            width: self.target.width,
            height: self.target.height,
            stride: self.row_bytes,
            format: self.target.format,
            pts: self.last_pts,
            time_base: self.time_base,
        }
    }

    fn scale(&mut self, source: &frame::Video) -> Result<()> {
        if source.width() == 0 || source.height() == 0 {
            return Err(Error::Convert("decoded frame has no pixels".into()));
        }
        let scaler = ensure_scaler(
            &mut self.scaler,
            (source.format(), source.width(), source.height()),
            self.target_pixel,
            self.target,
        )?;
        scaler
            .run(source, &mut self.scaled)
            .map_err(|e| Error::Convert(format!("scale failed: {e}")))
    }

    fn pack(&mut self) -> Result<()> {
        let stride = self.scaled.stride(0);
        let data = self.scaled.data(0);
        let rows = self.target.height as usize;
        if stride < self.row_bytes || data.len() < stride * (rows - 1) + self.row_bytes {
            return Err(Error::Convert("scaler produced a short image".into()));
        }
        for (y, row) in self.packed.chunks_exact_mut(self.row_bytes).take(rows).enumerate() {
            let start = y * stride;
            row.copy_from_slice(&data[start..start + self.row_bytes]);
        }
        Ok(())
    }
}

/// Returns a scaler for `source`, rebuilding it when the source shape changed.
fn ensure_scaler(
    slot: &mut Option<ScalerSlot>,
    source: (Pixel, u32, u32),
    target_pixel: Pixel,
    target: VideoTarget,
) -> Result<&mut scaling::Context> {
    if slot.as_ref().is_none_or(|current| current.source != source) {
        let (format, width, height) = source;
        let context = scaling::Context::get(
            format,
            width,
            height,
            target_pixel,
            target.width,
            target.height,
            scaling::Flags::FAST_BILINEAR,
        )
        .map_err(|e| Error::Convert(format!("failed to create scaler: {e}")))?;
        *slot = Some(ScalerSlot { context, source });
    }
    slot.as_mut()
        .map(|current| &mut current.context)
        .ok_or_else(|| Error::Convert("scaler unavailable".into()))
}

impl VideoConverter for FfmpegVideoConverter {
    type Frame = FfmpegFrame;

    fn target(&self) -> VideoTarget {
        self.target
    }

    fn convert(&mut self, frame: &FfmpegFrame) -> Result<VideoFrameView<'_>> {
        let FfmpegFrame::Video(decoded) = frame else {
            return Err(Error::Convert("expected a video frame".into()));
        };
        let pts = decoded.timestamp();

        if hwaccel::is_hardware_format(decoded.format()) {
            // Scratch frame lives only for this call
            let host = hwaccel::transfer_to_host(decoded)?;
            self.scale(&host)?;
        } else {
            self.scale(decoded)?;
        }
        self.pack()?;

        self.last_pts = pts;
        self.has_output = true;
        Ok(self.view())
    }

    fn last_output(&self) -> Option<VideoFrameView<'_>> {
        self.has_output.then(|| self.view())
    }
}
