// SPDX-License-Identifier: MPL-2.0
//! Port definitions (traits) for dependency inversion.
//!
//! This module defines abstract interfaces that infrastructure adapters implement.
//! These traits use only domain types, ensuring the playback loop remains
//! independent of the native media library.
//!
//! # Available Ports
//!
//! - [`source`]: Container demultiplexing
//! - [`decoder`]: Per-stream decode state machine
//! - [`convert`]: Pixel and sample conversion
//! - [`recorder`]: Re-encoding converted frames
//! - [`backend`]: Factory tying the stages together
//!
//! # Design Notes
//!
//! - Native frame and packet types only appear as associated types
//! - Every stage is `Send` so the playback thread can own it
//! - Methods return `Result` with the crate error type

pub mod backend;
pub mod convert;
pub mod decoder;
pub mod recorder;
pub mod source;

pub use backend::{MediaBackend, RecordingInput};
pub use convert::{AudioResampler, VideoConverter};
pub use decoder::{DecoderState, Received, StreamDecoder};
pub use recorder::VideoRecorder;
pub use source::{MediaPacket, PacketSource};
