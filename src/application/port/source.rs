// SPDX-License-Identifier: MPL-2.0
//! Packet source port definition.
//!
//! A [`PacketSource`] owns the demultiplexing context for one media source:
//! it hands out compressed packets in container order and moves the read
//! cursor on seek. It knows nothing about decoding.

use crate::domain::media::{first_of_kind, MediaKind, StreamDescriptor};
use crate::domain::playback::SeekDirection;
use crate::error::Result;

/// A compressed packet belonging to one stream.
pub trait MediaPacket: Send {
    /// Index of the stream the packet belongs to.
    fn stream_index(&self) -> usize;

    /// Presentation timestamp in the stream's time base, if known.
    fn pts(&self) -> Option<i64>;
}

/// Port for reading container packets.
///
/// # Lifecycle
///
/// 1. Created open by the backend (`MediaBackend::open_source`)
/// 2. `read_packet()` until it returns `Ok(None)` (end of stream)
/// 3. `seek_to_fraction()` / `rewind()` to move the cursor
/// 4. `close()` releases the demux context; calling it twice is harmless
pub trait PacketSource: Send {
    type Packet: MediaPacket;

    /// Descriptors of the first video and first audio stream, in index order.
    fn descriptors(&self) -> &[StreamDescriptor];

    /// Reads the next packet of any stream.
    ///
    /// Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is closed or the read fails.
    fn read_packet(&mut self) -> Result<Option<Self::Packet>>;

    /// Moves the cursor to `fraction` of the stream's duration.
    ///
    /// The target timestamp is `duration * fraction` in the stream time base.
    /// On success all decoders fed from this source must be flushed.
    ///
    /// # Errors
    ///
    /// Returns [`SeekError::Unbounded`](crate::error::SeekError::Unbounded) when
    /// the stream has no positive duration, or a native seek error.
    fn seek_to_fraction(
        &mut self,
        stream_index: usize,
        fraction: f64,
        direction: SeekDirection,
    ) -> Result<()>;

    /// Moves the cursor back to the first packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be repositioned.
    fn rewind(&mut self) -> Result<()>;

    /// Releases the demux context. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// First stream of the given kind.
    fn first_stream(&self, kind: MediaKind) -> Option<&StreamDescriptor> {
        first_of_kind(self.descriptors(), kind)
    }

    /// Returns `true` when the primary stream has a positive duration.
    ///
    /// The primary stream is the video stream when present, audio otherwise.
    fn is_bounded(&self) -> bool {
        self.first_stream(MediaKind::Video)
            .or_else(|| self.first_stream(MediaKind::Audio))
            .is_some_and(StreamDescriptor::is_bounded)
    }
}
