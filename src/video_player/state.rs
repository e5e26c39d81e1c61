// SPDX-License-Identifier: MPL-2.0
//! State mirrored between the control surface and the playback thread.
//!
//! Commands carry every change *into* the loop. These atomics only publish
//! what the loop (or the control surface, for transitions it owns) decided,
//! so callers can poll without a round trip.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::domain::playback::PlaybackState;

/// Lock-free snapshot of a session.
#[derive(Debug, Default)]
pub struct SharedState {
    state: AtomicU8,
    /// Last progress fraction as `f64` bits; written by the loop thread only.
    progress: AtomicU64,
    video_frames: AtomicU64,
    audio_buffers: AtomicU64,
    recording: AtomicBool,
    /// Set once the end-of-playback notification fired for the current segment.
    ended_reported: AtomicBool,
}

impl SharedState {
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Atomically moves from `from` to `to`. Returns `false` if the state was
    /// something else.
    pub fn transition(&self, from: PlaybackState, to: PlaybackState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }

    pub fn set_progress(&self, fraction: f64) {
        self.progress.store(fraction.to_bits(), Ordering::Relaxed);
    }

    /// Video frames delivered since the session was opened.
    #[must_use]
    pub fn video_frames(&self) -> u64 {
        self.video_frames.load(Ordering::Relaxed)
    }

    /// Audio buffers delivered since the session was opened.
    #[must_use]
    pub fn audio_buffers(&self) -> u64 {
        self.audio_buffers.load(Ordering::Relaxed)
    }

    /// Whether a recorder is attached to the pipeline.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub(crate) fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Release);
    }

    pub(crate) fn count_video_frame(&self) {
        self.video_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_audio_buffer(&self) {
        self.audio_buffers.fetch_add(1, Ordering::Relaxed);
    }

    /// Claims the end-of-playback notification. Only the first caller per
    /// segment gets `true`.
    pub(crate) fn claim_ended(&self) -> bool {
        !self.ended_reported.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn reset_ended(&self) {
        self.ended_reported.store(false, Ordering::Release);
    }
}
