// SPDX-License-Identifier: MPL-2.0
//! Stream decoder port definition.
//!
//! Audio and video decoders share one state machine:
//!
//! ```text
//! Idle -> Open -> Decoding -> Flushing -> Closed
//!           ^________|___________|   (flush)
//! ```
//!
//! Packets and frames are not 1:1. A packet may yield zero, one or several
//! frames, and frames may lag packets because of reordering. Callers submit one
//! packet and then call [`StreamDecoder::try_receive_frame`] until it reports
//! [`Received::NeedMoreInput`] or [`Received::EndOfStream`].

use crate::domain::media::StreamDescriptor;
use crate::error::Result;

/// Decoder lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    #[default]
    Idle,
    /// Codec opened, no packet submitted since the last flush.
    Open,
    Decoding,
    /// End-of-stream marker submitted, draining buffered frames.
    Flushing,
    Closed,
}

/// Outcome of one receive attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Received<F> {
    Frame(F),
    NeedMoreInput,
    EndOfStream,
}

/// Port for per-stream decoding.
///
/// The frame returned by [`try_receive_frame`](StreamDecoder::try_receive_frame)
/// borrows decoder storage, so it must be converted or copied before the
/// next call on the same decoder.
pub trait StreamDecoder: Send {
    type Packet;
    type Frame;

    fn descriptor(&self) -> &StreamDescriptor;

    fn state(&self) -> DecoderState;

    /// Submits a packet, or `None` to enter flushing mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`](crate::error::Error::Decode) when the packet is
    /// rejected. The packet is dropped, not retried.
    fn submit_packet(&mut self, packet: Option<&Self::Packet>) -> Result<()>;

    /// Attempts to pull one decoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`](crate::error::Error::Decode) for a corrupt frame.
    fn try_receive_frame(&mut self) -> Result<Received<&Self::Frame>>;

    /// Discards buffered decode history (after a seek or a drained end of stream).
    fn flush(&mut self);

    /// Releases the codec context. Idempotent.
    fn close(&mut self);
}
