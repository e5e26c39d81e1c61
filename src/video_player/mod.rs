// SPDX-License-Identifier: MPL-2.0
//! Playback engine.
//!
//! [`MediaPlayer`] is the control surface. It owns a dedicated playback
//! thread running the read/decode/convert/deliver loop and talks to it through
//! a bounded command queue; results reach the caller through a
//! [`PlaybackSink`].

mod clock;
mod command;
mod pipeline;
mod session;
mod sink;
mod state;
pub mod time_units;

#[cfg(test)]
mod test_backend;

pub use clock::PlaybackClock;
pub use command::{PlayerCommand, Reply};
pub use session::MediaPlayer;
pub use sink::{ChannelSink, NullSink, PlaybackEnded, PlaybackEvent, PlaybackSink};
pub use state::SharedState;
