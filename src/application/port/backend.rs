// SPDX-License-Identifier: MPL-2.0
//! Backend factory port.
//!
//! A [`MediaBackend`] ties the per-stage ports together so the playback loop
//! can be written once against associated types and run on the real media
//! library or on a scripted backend in tests.

use super::convert::{AudioResampler, VideoConverter};
use super::decoder::StreamDecoder;
use super::recorder::VideoRecorder;
use super::source::{MediaPacket, PacketSource};
use crate::domain::media::{
    AudioTarget, HwAccel, PixelFormat, RecordingSettings, StreamDescriptor, VideoTarget,
};
use crate::error::Result;
use std::path::Path;

/// Geometry of the frames a recorder will receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingInput {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Factory for every native stage of the pipeline.
pub trait MediaBackend: Send + Sync + 'static {
    type Packet: MediaPacket;
    /// Decoded frame of either kind.
    type Frame;
    type Source: PacketSource<Packet = Self::Packet>;
    type Decoder: StreamDecoder<Packet = Self::Packet, Frame = Self::Frame>;
    type VideoConverter: VideoConverter<Frame = Self::Frame>;
    type AudioResampler: AudioResampler<Frame = Self::Frame>;
    type Recorder: VideoRecorder;

    /// Opens a file path or network URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`](crate::error::Error::Open) if the container
    /// cannot be parsed or has neither audio nor video.
    fn open_source(&self, url: &str) -> Result<Self::Source>;

    /// Opens a decoder for one of the source's streams.
    ///
    /// A hardware device is attached to video decoders when requested and
    /// available; otherwise decoding falls back to software.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`](crate::error::Error::Codec) if no decoder
    /// exists or it fails to open.
    fn open_decoder(
        &self,
        source: &Self::Source,
        descriptor: &StreamDescriptor,
        hw_accel: &HwAccel,
    ) -> Result<Self::Decoder>;

    /// Creates the video converter for a stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is not a packed format.
    fn video_converter(
        &self,
        descriptor: &StreamDescriptor,
        target: VideoTarget,
    ) -> Result<Self::VideoConverter>;

    /// Creates the audio resampler for a stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`](crate::error::Error::UnsupportedFormat)
    /// for planar targets.
    fn audio_resampler(
        &self,
        descriptor: &StreamDescriptor,
        target: AudioTarget,
    ) -> Result<Self::AudioResampler>;

    /// Opens an encoder writing to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recording`](crate::error::Error::Recording).
    fn start_recording(
        &self,
        path: &Path,
        input: RecordingInput,
        settings: &RecordingSettings,
    ) -> Result<Self::Recorder>;
}
