// SPDX-License-Identifier: MPL-2.0
//! Crate-wide error taxonomy.
//!
//! Errors fall into two groups. Session-fatal errors ([`Error::Open`],
//! [`Error::Codec`], [`Error::UnsupportedFormat`], [`Error::NotOpen`]) stop a
//! session from starting or terminate its playback loop. Everything else is
//! scoped to a single frame or a single control call: the pipeline logs it and
//! keeps going.
//!
//! Payloads are plain strings so errors can be cloned into playback
//! notifications and sent across the loop thread boundary.

use thiserror::Error;

/// Why a seek request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeekError {
    /// The stream has no known duration (live or unbounded source).
    #[error("source has no bounded duration")]
    Unbounded,

    /// No media source is open.
    #[error("no media source is open")]
    NotOpen,

    /// The native seek call failed.
    #[error("{0}")]
    Native(String),
}

/// Error type for all pipeline operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Source unreadable, unparsable, or without any audio/video stream.
    #[error("Failed to open media source: {0}")]
    Open(String),

    /// Decoder or encoder could not be found or opened.
    #[error("Codec error: {0}")]
    Codec(String),

    /// A packet could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Scaling or resampling failed for one frame.
    #[error("Conversion error: {0}")]
    Convert(String),

    /// A seek request was refused or failed.
    #[error("Seek failed: {0}")]
    Seek(#[from] SeekError),

    /// The requested target format is not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The recording sub-pipeline failed. Playback is unaffected.
    #[error("Recording error: {0}")]
    Recording(String),

    /// A caller passed an out-of-range argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs an open session.
    #[error("Player not ready: {0}")]
    NotOpen(String),

    /// No video frame has been converted yet.
    #[error("No frame available: {0}")]
    NoFrame(String),

    /// Configuration could not be read or written.
    #[error("Config error: {0}")]
    Config(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Still image encoding failed.
    #[error("Image error: {0}")]
    Image(String),
}

impl Error {
    /// Returns `true` for errors that end a session rather than a single frame.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Open(_) | Error::Codec(_) | Error::UnsupportedFormat(_) | Error::NotOpen(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<image_rs::ImageError> for Error {
    fn from(err: image_rs::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_error_converts_into_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        match err {
            Error::Io(message) => assert!(message.contains("missing")),
            other => panic!("expected Io variant, got {other:?}"),
        }
    }

    #[test]
    fn seek_error_wraps_into_error() {
        let err: Error = SeekError::Unbounded.into();
        assert!(matches!(err, Error::Seek(SeekError::Unbounded)));
        assert_eq!(err.to_string(), "Seek failed: source has no bounded duration");
    }

    #[test]
    fn open_and_codec_errors_are_fatal() {
        assert!(Error::Open("x".into()).is_fatal());
        assert!(Error::Codec("x".into()).is_fatal());
        assert!(Error::UnsupportedFormat("s16p".into()).is_fatal());
    }

    #[test]
    fn per_frame_errors_are_not_fatal() {
        assert!(!Error::Decode("x".into()).is_fatal());
        assert!(!Error::Convert("x".into()).is_fatal());
        assert!(!Error::Recording("x".into()).is_fatal());
        assert!(!Error::Seek(SeekError::NotOpen).is_fatal());
    }

    #[test]
    fn display_includes_context() {
        let err = Error::Convert("scale returned 0 rows".into());
        assert_eq!(format!("{err}"), "Conversion error: scale returned 0 rows");
    }
}
