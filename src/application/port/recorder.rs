// SPDX-License-Identifier: MPL-2.0
//! Recording port definition.

use crate::domain::media::VideoFrameView;
use crate::error::Result;

/// Re-encodes converted video frames into a container file.
///
/// Encoder timestamps come from an internal counter, one tick per frame,
/// independent of source timestamps.
pub trait VideoRecorder: Send {
    /// Converts and submits one frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recording`](crate::error::Error::Recording). Playback
    /// is not affected; the caller stops recording.
    fn encode_frame(&mut self, frame: &VideoFrameView<'_>) -> Result<()>;

    /// Frames submitted so far.
    fn frames_written(&self) -> u64;

    /// Drains the encoder and writes the container trailer.
    ///
    /// Returns the number of frames written. Finalizing is attempted once;
    /// later calls return the same result, error included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recording`](crate::error::Error::Recording) if draining
    /// or finalizing fails.
    fn finish(&mut self) -> Result<u64>;
}
