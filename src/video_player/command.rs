// SPDX-License-Identifier: MPL-2.0
//! Commands sent from the control surface to the playback loop.
//!
//! Commands are consumed at loop-iteration boundaries only, so each one is
//! applied exactly once at a point where no frame is half-processed.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::domain::media::OwnedVideoFrame;
use crate::domain::playback::{PlaybackSpeed, SeekRequest};
use crate::error::Result;

/// Reply channel for commands whose outcome the caller waits on.
pub type Reply<T> = oneshot::Sender<Result<T>>;

/// A request for the playback loop.
#[derive(Debug)]
pub enum PlayerCommand {
    /// Pause (`true`) or resume (`false`).
    Pause(bool),

    /// Seek at the top of the next iteration. The reply is sent once the
    /// seek has been applied and decoders flushed.
    Seek {
        request: SeekRequest,
        reply: Reply<()>,
    },

    /// Change the pacing speed for the following frames.
    SetSpeed(PlaybackSpeed),

    /// Copy out the most recently converted video frame.
    Capture { reply: Reply<OwnedVideoFrame> },

    /// Start re-encoding converted video frames to `path`.
    StartRecording { path: PathBuf, reply: Reply<()> },

    /// Finish the active recording. Replies with the frame count.
    StopRecording { reply: Reply<u64> },
}

impl PlayerCommand {
    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Pause(_) => "pause",
            PlayerCommand::Seek { .. } => "seek",
            PlayerCommand::SetSpeed(_) => "set_speed",
            PlayerCommand::Capture { .. } => "capture",
            PlayerCommand::StartRecording { .. } => "start_recording",
            PlayerCommand::StopRecording { .. } => "stop_recording",
        }
    }
}
