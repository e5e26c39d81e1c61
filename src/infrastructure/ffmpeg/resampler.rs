// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` software resampler implementing [`AudioResampler`].
//!
//! Conversion writes straight into a growable byte buffer through
//! `swr_convert`, so the output size is under our control: every call sizes
//! the buffer for the worst case (resampler delay included) before converting.

use ffmpeg_next::ffi;
use ffmpeg_next::format::{sample, Sample};
use ffmpeg_next::frame;
use ffmpeg_next::software::resampling;
use ffmpeg_next::ChannelLayout;

use super::decoder::FfmpegFrame;
use crate::application::port::AudioResampler;
use crate::diagnostics::{ResourceGuard, ResourceKind, ResourceTracker};
use crate::domain::media::{
    interleaved_byte_len, max_output_samples, AudioSamples, AudioTarget, SampleFormat,
    StreamDescriptor, TimeBase,
};
use crate::error::{Error, Result};

/// Maps a packed host sample format to the native one.
///
/// Planar formats have no mapping: the resampler only writes interleaved audio.
fn native_sample(format: SampleFormat) -> Option<Sample> {
    let packed = sample::Type::Packed;
    match format {
        SampleFormat::U8 => Some(Sample::U8(packed)),
        SampleFormat::S16 => Some(Sample::I16(packed)),
        SampleFormat::S32 => Some(Sample::I32(packed)),
        SampleFormat::F32 => Some(Sample::F32(packed)),
        SampleFormat::F64 => Some(Sample::F64(packed)),
        SampleFormat::U8Planar
        | SampleFormat::S16Planar
        | SampleFormat::S32Planar
        | SampleFormat::F32Planar
        | SampleFormat::F64Planar => None,
    }
}

fn output_layout(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        _ => ChannelLayout::STEREO, // Downmix anything else to stereo
    }
}

/// Key of the source shape a resampling context was built for.
#[derive(Clone, Copy, PartialEq)]
struct SourceShape {
    format: Sample,
    layout: ChannelLayout,
    rate: u32,
}

/// Converts decoded audio to a fixed interleaved format.
pub struct FfmpegAudioResampler {
    target: AudioTarget,
    target_sample: Sample,
    time_base: TimeBase,
    context: Option<(resampling::Context, SourceShape)>,
    /// Output storage, grown on demand and never shrunk.
    buffer: Vec<u8>,
    _guard: ResourceGuard,
}

// SAFETY: the SwrContext is reached only through `&mut self`, and the
// resampler moves between threads as a whole, never shared.
unsafe impl Send for FfmpegAudioResampler {}

impl FfmpegAudioResampler {
    /// Creates a resampler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for planar targets.
    pub fn new(
        descriptor: &StreamDescriptor,
        target: AudioTarget,
        tracker: &ResourceTracker,
    ) -> Result<Self> {
        let target_sample = native_sample(target.format).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "planar audio output ({}) is not supported, use a packed format",
                target.format
            ))
        })?;
        if target.sample_rate == 0 || target.channels == 0 {
            return Err(Error::InvalidArgument(
                "audio target needs a sample rate and channel count".into(),
            ));
        }
        let target = AudioTarget {
            channels: target.channels.min(2),
            ..target
        };

        tracing::debug!(
            stream = descriptor.index,
            rate = target.sample_rate,
            channels = target.channels,
            format = %target.format,
            "audio resampler created"
        );

        Ok(Self {
            target,
            target_sample,
            time_base: descriptor.time_base,
            context: None,
            buffer: Vec::new(),
            _guard: tracker.acquire(ResourceKind::AudioResampler),
        })
    }

    fn ensure_context(&mut self, shape: SourceShape) -> Result<&mut resampling::Context> {
        let stale = self
            .context
            .as_ref()
            .is_none_or(|(_, current)| *current != shape);
        if stale {
            let context = resampling::Context::get(
                shape.format,
                shape.layout,
                shape.rate,
                self.target_sample,
                output_layout(self.target.channels),
                self.target.sample_rate,
            )
            .map_err(|e| Error::Convert(format!("failed to create resampler: {e}")))?;
            self.context = Some((context, shape));
        }
        self.context
            .as_mut()
            .map(|(context, _)| context)
            .ok_or_else(|| Error::Convert("resampler unavailable".into()))
    }
}

fn source_shape(frame: &frame::Audio, rate_hint: u32) -> Result<SourceShape> {
    let rate = if frame.rate() > 0 { frame.rate() } else { rate_hint };
    if rate == 0 {
        return Err(Error::Convert("audio frame has no sample rate".into()));
    }
    let mut layout = frame.channel_layout();
    if layout.is_empty() {
        layout = ChannelLayout::default(i32::from(frame.channels()));
    }
    Ok(SourceShape {
        format: frame.format(),
        layout,
        rate,
    })
}

/// Input samples the context still holds, counted at the source rate.
///
/// `Context::delay` reports in whole seconds and rounds filter delays to zero.
fn buffered_input(context: &mut resampling::Context, source_rate: u32) -> i64 {
    // SAFETY: the context pointer is valid for the duration of the call.
    let delay = unsafe { ffi::swr_get_delay(context.as_mut_ptr(), i64::from(source_rate)) };
    delay.max(0)
}

impl AudioResampler for FfmpegAudioResampler {
    type Frame = FfmpegFrame;

    fn target(&self) -> AudioTarget {
        self.target
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn convert(&mut self, frame: &FfmpegFrame, source_rate_hint: u32) -> Result<AudioSamples<'_>> {
        let FfmpegFrame::Audio(decoded) = frame else {
            return Err(Error::Convert("expected an audio frame".into()));
        };
        let shape = source_shape(decoded, source_rate_hint)?;
        let target = self.target;
        let input_samples = decoded.samples();

        let context = self.ensure_context(shape)?;
        let delay = buffered_input(context, shape.rate);
        let max_samples = max_output_samples(delay, input_samples, shape.rate, target.sample_rate);
        let needed = interleaved_byte_len(max_samples, target.channels, target.format);

        // SAFETY: the context pointer is valid for the duration of the call.
        let raw_context = unsafe { context.as_mut_ptr() };
        if needed > self.buffer.len() {
            self.buffer.resize(needed, 0);
        }

        let mut out_ptr = self.buffer.as_mut_ptr();
        // SAFETY: the output buffer holds `max_samples` interleaved samples per
        // channel; input pointers come from a decoded frame with
        // `input_samples` samples per channel.
        let converted = unsafe {
            ffi::swr_convert(
                raw_context,
                &mut out_ptr,
                max_samples as i32,
                (*decoded.as_ptr()).extended_data as *const *const u8,
                input_samples as i32,
            )
        };
        if converted < 0 {
            return Err(Error::Convert(format!(
                "resample failed: {}",
                ffmpeg_next::Error::from(converted)
            )));
        }

        let frames = converted as usize;
        let byte_len = interleaved_byte_len(frames, target.channels, target.format);
        if frames > max_samples || byte_len > self.buffer.len() {
            return Err(Error::Convert(format!(
                "resampler produced {frames} samples, expected at most {max_samples}"
            )));
        }

        Ok(AudioSamples {
            data: &self.buffer[..byte_len],
            channels: target.channels,
            sample_rate: target.sample_rate,
            format: target.format,
            frames,
            pts: decoded.timestamp(),
            time_base: self.time_base,
        })
    }
}
