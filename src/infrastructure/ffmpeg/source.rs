// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` demuxer adapter implementing [`PacketSource`].

use ffmpeg_next::format::context::Input;
use ffmpeg_next::media::Type;

use super::ensure_initialized;
use crate::application::port::{MediaPacket, PacketSource};
use crate::diagnostics::{ResourceGuard, ResourceKind, ResourceTracker};
use crate::domain::media::{AudioParams, StreamDescriptor, StreamParams, TimeBase, VideoParams};
use crate::domain::playback::SeekDirection;
use crate::error::{Error, Result, SeekError};
use crate::video_player::time_units;

/// Compressed packet read from an [`FfmpegSource`].
pub struct FfmpegPacket(pub(crate) ffmpeg_next::Packet);

impl MediaPacket for FfmpegPacket {
    fn stream_index(&self) -> usize {
        self.0.stream()
    }

    fn pts(&self) -> Option<i64> {
        self.0.pts()
    }
}

/// Demux context for one file or network URL.
///
/// Only the first video and the first audio stream are described; packets of
/// other streams are still returned by [`read_packet`](PacketSource::read_packet)
/// and ignored by the playback loop.
pub struct FfmpegSource {
    input: Option<Input>,
    url: String,
    descriptors: Vec<StreamDescriptor>,
    /// Whether any packet was read since open or the last rewind.
    consumed: bool,
    guard: Option<ResourceGuard>,
}

impl FfmpegSource {
    /// Opens `url` and derives stream descriptors.
    pub fn open(url: &str, tracker: &ResourceTracker) -> Result<Self> {
        ensure_initialized()?;

        let input = ffmpeg_next::format::input(&url)
            .map_err(|e| Error::Open(format!("{url}: {e}")))?;
        let container_duration = input.duration();

        let mut descriptors = Vec::with_capacity(2);
        let mut have_video = false;
        let mut have_audio = false;
        for stream in input.streams() {
            let medium = stream.parameters().medium();
            let wanted = match medium {
                Type::Video => !have_video,
                Type::Audio => !have_audio,
                _ => false,
            };
            if !wanted {
                continue;
            }
            match describe_stream(&stream, container_duration) {
                Ok(descriptor) => {
                    have_video |= medium == Type::Video;
                    have_audio |= medium == Type::Audio;
                    descriptors.push(descriptor);
                }
                Err(e) => {
                    tracing::warn!(url, stream = stream.index(), error = %e, "skipping undecodable stream");
                }
            }
        }

        if descriptors.is_empty() {
            return Err(Error::Open(format!("{url}: no audio or video stream found")));
        }

        tracing::info!(
            url,
            streams = descriptors.len(),
            bounded = descriptors.iter().any(StreamDescriptor::is_bounded),
            "source opened"
        );

        Ok(Self {
            input: Some(input),
            url: url.to_string(),
            descriptors,
            consumed: false,
            guard: Some(tracker.acquire(ResourceKind::Source)),
        })
    }

    /// Stream access for decoder construction.
    pub(crate) fn stream(&self, index: usize) -> Result<ffmpeg_next::format::stream::Stream<'_>> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| Error::NotOpen("source is closed".into()))?;
        input
            .stream(index)
            .ok_or_else(|| Error::Codec(format!("stream {index} does not exist")))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn seek_micros(&mut self, target_us: i64, direction: SeekDirection) -> Result<()> {
        let input = self.input.as_mut().ok_or(SeekError::NotOpen)?;
        let result = match direction {
            // Keyframe at or before the target
            SeekDirection::Backward => input.seek(target_us, ..target_us),
            SeekDirection::Forward => input.seek(target_us, target_us..),
        };
        result.map_err(|e| Error::Seek(SeekError::Native(e.to_string())))
    }
}

/// Builds a descriptor by probing the stream's codec parameters.
fn describe_stream(
    stream: &ffmpeg_next::format::stream::Stream<'_>,
    container_duration: i64,
) -> Result<StreamDescriptor> {
    let parameters = stream.parameters();
    let codec = parameters.id().name().to_string();
    let rational = stream.time_base();
    let time_base = TimeBase::new(rational.numerator(), rational.denominator());
    let duration = time_units::effective_duration(stream.duration(), container_duration, time_base);

    let context = ffmpeg_next::codec::context::Context::from_parameters(parameters)
        .map_err(|e| Error::Codec(format!("{codec}: {e}")))?;

    let params = match stream.parameters().medium() {
        Type::Video => {
            let probe = context
                .decoder()
                .video()
                .map_err(|e| Error::Codec(format!("{codec}: {e}")))?;
            StreamParams::Video(VideoParams {
                width: probe.width(),
                height: probe.height(),
                pixel_format: probe
                    .format()
                    .descriptor()
                    .map_or_else(|| "unknown".to_string(), |d| d.name().to_string()),
            })
        }
        Type::Audio => {
            let probe = context
                .decoder()
                .audio()
                .map_err(|e| Error::Codec(format!("{codec}: {e}")))?;
            StreamParams::Audio(AudioParams {
                sample_rate: probe.rate(),
                channels: probe.channels(),
                sample_format: probe.format().name().to_string(),
            })
        }
        other => {
            return Err(Error::Open(format!("unexpected stream type {other:?}")));
        }
    };

    Ok(StreamDescriptor {
        index: stream.index(),
        codec,
        time_base,
        duration,
        params,
    })
}

impl PacketSource for FfmpegSource {
    type Packet = FfmpegPacket;

    fn descriptors(&self) -> &[StreamDescriptor] {
        &self.descriptors
    }

    fn read_packet(&mut self) -> Result<Option<FfmpegPacket>> {
        let input = self
            .input
            .as_mut()
            .ok_or_else(|| Error::NotOpen("source is closed".into()))?;
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(input) {
            Ok(()) => {
                self.consumed = true;
                Ok(Some(FfmpegPacket(packet)))
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(Error::Decode(format!("packet read failed: {e}"))),
        }
    }

    fn seek_to_fraction(
        &mut self,
        stream_index: usize,
        fraction: f64,
        direction: SeekDirection,
    ) -> Result<()> {
        let descriptor = self
            .descriptors
            .iter()
            .find(|d| d.index == stream_index)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown stream {stream_index}")))?;
        if !descriptor.is_bounded() {
            return Err(SeekError::Unbounded.into());
        }

        let target_pts = time_units::fraction_to_pts(descriptor.duration, fraction);
        let target_us = time_units::pts_to_micros(target_pts, descriptor.time_base);
        tracing::debug!(stream_index, fraction, target_pts, target_us, "seeking");

        self.seek_micros(target_us, direction)?;
        self.consumed = true;
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        if !self.consumed {
            return Ok(());
        }
        self.seek_micros(0, SeekDirection::Backward)?;
        self.consumed = false;
        Ok(())
    }

    fn close(&mut self) {
        if self.input.take().is_some() {
            tracing::debug!(url = %self.url, "source closed");
        }
        self.guard = None;
    }

    fn is_open(&self) -> bool {
        self.input.is_some()
    }
}
