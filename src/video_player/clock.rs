// SPDX-License-Identifier: MPL-2.0
//! Playback clock: video pacing and progress.
//!
//! Video is paced in software from frame timestamps; audio is delivered as
//! soon as it is resampled and relies on the output device for timing. The
//! clock therefore only ever sees video timestamps (or audio timestamps for
//! audio-only sources, where pacing is skipped).
//!
//! The first frame after a start or a completed seek is never delayed: the
//! previous timestamp belongs to a different play segment.

use std::time::Duration;

use crate::domain::media::TimeBase;
use crate::domain::playback::PlaybackSpeed;

/// Pacing and progress state for one play segment.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    last_seconds: f64,
    first_frame: bool,
    just_seeked: bool,
    duration_seconds: f64,
}

impl PlaybackClock {
    /// Creates a clock for a source of the given duration.
    ///
    /// Durations of zero or less mark a live source without progress.
    #[must_use]
    pub fn new(duration_seconds: f64) -> Self {
        Self {
            last_seconds: 0.0,
            first_frame: true,
            just_seeked: false,
            duration_seconds: if duration_seconds.is_finite() {
                duration_seconds
            } else {
                0.0
            },
        }
    }

    /// Called on every start from `Stopped`.
    pub fn reset_for_start(&mut self) {
        self.first_frame = true;
        self.just_seeked = false;
        self.last_seconds = 0.0;
    }

    /// Called once a seek has been applied and decoders flushed.
    pub fn mark_seeked(&mut self) {
        self.just_seeked = true;
        self.first_frame = true;
    }

    /// Called when playback resumes from pause. Wall-clock time spent paused
    /// must not turn into a pacing delay.
    pub fn mark_resumed(&mut self) {
        self.first_frame = true;
    }

    /// Whether the next frame starts a new segment.
    #[must_use]
    pub fn is_first_frame(&self) -> bool {
        self.first_frame || self.just_seeked
    }

    /// Seconds of the most recent paced frame.
    #[must_use]
    pub fn last_seconds(&self) -> f64 {
        self.last_seconds
    }

    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Returns how long to wait before presenting a frame at `pts`.
    ///
    /// Frames without a timestamp inherit the previous one and get no delay.
    /// Timestamps going backwards never produce a negative wait.
    pub fn pace(&mut self, pts: Option<i64>, time_base: TimeBase, speed: PlaybackSpeed) -> Duration {
        let current = pts.map_or(self.last_seconds, |pts| time_base.seconds(pts));

        let delay = if self.is_first_frame() {
            self.first_frame = false;
            self.just_seeked = false;
            0.0
        } else {
            ((current - self.last_seconds) / speed.value()).max(0.0)
        };
        self.last_seconds = current;

        if delay.is_finite() {
            Duration::from_secs_f64(delay)
        } else {
            Duration::ZERO
        }
    }

    /// Fraction of the source played at `current_seconds`, in `[0, 1]`.
    ///
    /// Live sources always report 1.
    #[must_use]
    pub fn progress(&self, current_seconds: f64) -> f64 {
        if self.duration_seconds <= 0.0 {
            return 1.0;
        }
        let fraction = current_seconds / self.duration_seconds;
        if fraction.is_nan() {
            return 0.0;
        }
        fraction.clamp(0.0, 1.0)
    }
}
