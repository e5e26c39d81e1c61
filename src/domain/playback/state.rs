// SPDX-License-Identifier: MPL-2.0
//! Playback state machine values and seek requests.

use super::newtypes::SeekFraction;

/// Session playback state.
///
/// `Stopped` is both the initial state and the state after playback ends;
/// a new start re-enters `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlaybackState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlaybackState {
    #[must_use]
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }

    #[must_use]
    pub fn is_paused(self) -> bool {
        matches!(self, Self::Paused)
    }

    #[must_use]
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true while the playback loop is running (playing or paused).
    #[must_use]
    pub fn is_active(self) -> bool {
        !self.is_stopped()
    }

    /// Decodes the value stored in an atomic mirror. Unknown values map to `Stopped`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

/// Which keyframe a seek lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekDirection {
    /// Nearest keyframe at or before the target.
    #[default]
    Backward,
    /// Nearest keyframe at or after the target.
    Forward,
}

/// A pending seek, consumed at most once by the playback loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    pub fraction: SeekFraction,
    pub direction: SeekDirection,
}

impl SeekRequest {
    #[must_use]
    pub fn new(fraction: SeekFraction, backward: bool) -> Self {
        Self {
            fraction,
            direction: if backward {
                SeekDirection::Backward
            } else {
                SeekDirection::Forward
            },
        }
    }
}
