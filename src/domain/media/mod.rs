// SPDX-License-Identifier: MPL-2.0
//! Media value types: stream descriptors, formats and frame views.

pub mod audio;
pub mod frame;
pub mod target;
pub mod types;

pub use audio::{interleaved_byte_len, max_output_samples};
pub use frame::{AudioSamples, OwnedAudioSamples, OwnedVideoFrame, VideoFrameView};
pub use target::{AudioTarget, RecordingSettings, VideoTarget};
pub use types::{
    first_of_kind, AudioParams, HwAccel, MediaKind, PixelFormat, SampleFormat, StreamDescriptor,
    StreamParams, TimeBase, UnknownFormat, VideoParams,
};
