// SPDX-License-Identifier: MPL-2.0
//! `playwire` is a streaming media playback pipeline built on `FFmpeg`.
//!
//! It demultiplexes a file or network source, decodes audio and video,
//! converts frames to a fixed host format, paces video against its
//! timestamps and hands everything to a caller-supplied sink. Converted video
//! can be re-encoded to a file while playing.

#![doc(html_root_url = "https://docs.rs/playwire/0.1.0")]

pub mod application;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod media;
pub mod video_player;

#[cfg(test)]
pub(crate) mod test_utils;
