// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` decoder adapter implementing [`StreamDecoder`].
//!
//! One type serves both media kinds: the codec handle and the reusable
//! output frame are tagged variants chosen when the stream is opened.

use ffmpeg_next::{decoder, frame};

use super::hwaccel;
use super::source::{FfmpegPacket, FfmpegSource};
use crate::application::port::{DecoderState, Received, StreamDecoder};
use crate::diagnostics::{ResourceGuard, ResourceKind, ResourceTracker};
use crate::domain::media::{HwAccel, MediaKind, StreamDescriptor};
use crate::error::{Error, Result};

/// A decoded frame owned by an [`FfmpegDecoder`].
pub enum FfmpegFrame {
    Video(frame::Video),
    Audio(frame::Audio),
}

impl FfmpegFrame {
    /// Best-effort presentation timestamp.
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            FfmpegFrame::Video(f) => f.timestamp(),
            FfmpegFrame::Audio(f) => f.timestamp(),
        }
    }
}

enum Codec {
    Video(decoder::Video),
    Audio(decoder::Audio),
}

/// Decoder for one elementary stream.
pub struct FfmpegDecoder {
    codec: Option<Codec>,
    frame: FfmpegFrame,
    descriptor: StreamDescriptor,
    state: DecoderState,
    hardware: bool,
    guard: Option<ResourceGuard>,
}

impl FfmpegDecoder {
    /// Opens a decoder for `descriptor`'s stream in `source`.
    pub fn open(
        source: &FfmpegSource,
        descriptor: &StreamDescriptor,
        hw_accel: &HwAccel,
        tracker: &ResourceTracker,
    ) -> Result<Self> {
        let stream = source.stream(descriptor.index)?;
        let mut context = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| Error::Codec(format!("{}: {e}", descriptor.codec)))?;

        let mut hardware = false;
        if descriptor.kind() == MediaKind::Video {
            if let Some(device) = hw_accel.device() {
                hardware = hwaccel::attach_device(&mut context, device);
            }
        }

        let (codec, frame) = match descriptor.kind() {
            MediaKind::Video => {
                let video = context.decoder().video().map_err(|e| codec_error(descriptor, e))?;
                (Codec::Video(video), FfmpegFrame::Video(frame::Video::empty()))
            }
            MediaKind::Audio => {
                let audio = context.decoder().audio().map_err(|e| codec_error(descriptor, e))?;
                (Codec::Audio(audio), FfmpegFrame::Audio(frame::Audio::empty()))
            }
        };

        tracing::debug!(
            stream = descriptor.index,
            codec = %descriptor.codec,
            kind = %descriptor.kind(),
            hardware,
            "decoder opened"
        );

        Ok(Self {
            codec: Some(codec),
            frame,
            descriptor: descriptor.clone(),
            state: DecoderState::Open,
            hardware,
            guard: Some(tracker.acquire(ResourceKind::Decoder)),
        })
    }

    /// Whether a hardware device was attached at open time.
    #[must_use]
    pub fn is_hardware(&self) -> bool {
        self.hardware
    }

    fn opened(&mut self) -> Result<&mut decoder::Opened> {
        match self.codec.as_mut() {
            Some(Codec::Video(video)) => Ok(&mut **video),
            Some(Codec::Audio(audio)) => Ok(&mut **audio),
            None => Err(Error::NotOpen("decoder is closed".into())),
        }
    }
}

fn codec_error(descriptor: &StreamDescriptor, err: ffmpeg_next::Error) -> Error {
    match err {
        ffmpeg_next::Error::DecoderNotFound => {
            Error::Codec(format!("no decoder available for {}", descriptor.codec))
        }
        other => Error::Codec(format!("failed to open {} decoder: {other}", descriptor.codec)),
    }
}

fn is_again(err: &ffmpeg_next::Error) -> bool {
    matches!(err, ffmpeg_next::Error::Other { errno } if *errno == ffmpeg_next::error::EAGAIN)
}

impl StreamDecoder for FfmpegDecoder {
    type Packet = FfmpegPacket;
    type Frame = FfmpegFrame;

    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn state(&self) -> DecoderState {
        self.state
    }

    fn submit_packet(&mut self, packet: Option<&FfmpegPacket>) -> Result<()> {
        match packet {
            Some(packet) => {
                if self.state == DecoderState::Flushing {
                    return Err(Error::Decode("decoder is draining, flush it first".into()));
                }
                self.opened()?
                    .send_packet(&packet.0)
                    .map_err(|e| Error::Decode(format!("packet rejected: {e}")))?;
                self.state = DecoderState::Decoding;
            }
            None => {
                if self.state == DecoderState::Flushing {
                    return Ok(());
                }
                match self.opened()?.send_eof() {
                    Ok(()) | Err(ffmpeg_next::Error::Eof) => {}
                    Err(e) => return Err(Error::Decode(format!("drain failed: {e}"))),
                }
                self.state = DecoderState::Flushing;
            }
        }
        Ok(())
    }

    fn try_receive_frame(&mut self) -> Result<Received<&FfmpegFrame>> {
        let result = match (self.codec.as_mut(), &mut self.frame) {
            (Some(Codec::Video(decoder)), FfmpegFrame::Video(frame)) => decoder.receive_frame(frame),
            (Some(Codec::Audio(decoder)), FfmpegFrame::Audio(frame)) => decoder.receive_frame(frame),
            (None, _) => return Err(Error::NotOpen("decoder is closed".into())),
            _ => return Err(Error::Decode("frame kind does not match decoder".into())),
        };

        match result {
            Ok(()) => Ok(Received::Frame(&self.frame)),
            Err(ffmpeg_next::Error::Eof) => Ok(Received::EndOfStream),
            Err(e) if is_again(&e) => Ok(Received::NeedMoreInput),
            Err(e) => Err(Error::Decode(e.to_string())),
        }
    }

    fn flush(&mut self) {
        if let Ok(opened) = self.opened() {
            opened.flush();
            self.state = DecoderState::Open;
        }
    }

    fn close(&mut self) {
        if self.codec.take().is_some() {
            tracing::debug!(stream = self.descriptor.index, "decoder closed");
        }
        self.state = DecoderState::Closed;
        self.guard = None;
    }
}
