// SPDX-License-Identifier: MPL-2.0
//! Domain layer - Core pipeline types with ZERO external dependencies.
//!
//! This module contains pure value objects and rules. It has no dependencies
//! on external crates (except `std`) so it can be tested without a media
//! library.
//!
//! # Modules
//!
//! - [`media`]: Stream descriptors, formats, frame views
//!   ([`StreamDescriptor`](media::StreamDescriptor), [`VideoFrameView`](media::VideoFrameView))
//! - [`playback`]: Control values ([`PlaybackState`](playback::PlaybackState),
//!   [`PlaybackSpeed`](playback::PlaybackSpeed), [`SeekRequest`](playback::SeekRequest))

pub mod media;
pub mod playback;
