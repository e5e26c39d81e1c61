// SPDX-License-Identifier: MPL-2.0
//! Playback control domain types.

pub mod newtypes;
pub mod state;

pub use newtypes::{PlaybackSpeed, NORMAL_SPEED, SeekFraction};
pub use state::{PlaybackState, SeekDirection, SeekRequest};
