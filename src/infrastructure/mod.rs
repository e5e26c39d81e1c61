// SPDX-License-Identifier: MPL-2.0
//! Infrastructure layer adapters.
//!
//! Concrete implementations of the port traits defined in
//! `application::port`, wrapping the native media library.
//!
//! # Available Adapters
//!
//! - [`ffmpeg`]: demuxing, decoding, conversion and recording via `FFmpeg`
//!   (implements [`MediaBackend`])
//!
//! [`MediaBackend`]: crate::application::port::MediaBackend

pub mod ffmpeg;

pub use ffmpeg::FfmpegBackend;
