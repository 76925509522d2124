//! # Error Types
//!
//! Every I/O outcome the dispatcher can observe is classified here. None of
//! these are fatal: they are returned from `send`, or reported through the
//! observability channel (log, stats, [`Subscriber::dispatch_failed`]) while
//! the connection stays open. Only `ConnectionEnded` accompanies a state
//! change.
//!
//! [`Subscriber::dispatch_failed`]: crate::subscriber::Subscriber::dispatch_failed

use thiserror::Error;

use crate::dispatcher::DispatchState;
use crate::stream::Direction;

/// Reason reported when a handle has no recorded error
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Coarse classification of a [`DispatchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Negative read result on the input handle
    ReadError,
    /// Negative write result on the output handle
    WriteError,
    /// Output handle accepted zero bytes (fixed-capacity stream is full)
    CapacityExhausted,
    /// Chunk not decodable as single-byte text
    DecodeFailure,
    /// Frame exceeded its bound or carried a malformed prefix
    FramingError,
    /// The handle signalled an error event
    StreamError,
    /// Input reached end-of-stream
    ConnectionEnded,
    /// Operation not valid in the current dispatcher state
    InvalidState,
}

/// Errors produced while dispatching stream traffic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("read failed: {reason}")]
    Read { reason: String },

    #[error("write failed: {reason}")]
    Write { reason: String },

    /// The destination accepted nothing; no retry is attempted
    #[error("output stream reached its capacity ({requested} bytes not written)")]
    CapacityExhausted { requested: usize },

    #[error("non-ascii byte 0x{byte:02x} at offset {position}")]
    Decode { position: usize, byte: u8 },

    #[error("framing error: {reason}")]
    Framing { reason: String },

    #[error("{direction} stream error: {reason}")]
    Stream { direction: Direction, reason: String },

    #[error("input stream ended")]
    ConnectionEnded,

    #[error("dispatcher is not open (state: {state})")]
    NotOpen { state: DispatchState },

    #[error("dispatcher cannot connect from state {state}")]
    AlreadyConnected { state: DispatchState },
}

impl DispatchError {
    /// Build a read error from a handle's last error, falling back to [`UNKNOWN_ERROR`]
    pub fn read(last_error: Option<String>) -> Self {
        Self::Read {
            reason: last_error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        }
    }

    /// Build a write error from a handle's last error, falling back to [`UNKNOWN_ERROR`]
    pub fn write(last_error: Option<String>) -> Self {
        Self::Write {
            reason: last_error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        }
    }

    /// Build a stream error event for `direction`
    pub fn stream(direction: Direction, last_error: Option<String>) -> Self {
        Self::Stream {
            direction,
            reason: last_error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        }
    }

    /// Build a framing error
    pub fn framing(reason: impl Into<String>) -> Self {
        Self::Framing {
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read { .. } => ErrorKind::ReadError,
            Self::Write { .. } => ErrorKind::WriteError,
            Self::CapacityExhausted { .. } => ErrorKind::CapacityExhausted,
            Self::Decode { .. } => ErrorKind::DecodeFailure,
            Self::Framing { .. } => ErrorKind::FramingError,
            Self::Stream { .. } => ErrorKind::StreamError,
            Self::ConnectionEnded => ErrorKind::ConnectionEnded,
            Self::NotOpen { .. } | Self::AlreadyConnected { .. } => ErrorKind::InvalidState,
        }
    }
}

/// Errors loading or validating a [`DispatcherConfig`](crate::config::DispatcherConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_reason() {
        let err = DispatchError::write(None);
        assert_eq!(err.to_string(), "write failed: unknown error");
        assert_eq!(err.kind(), ErrorKind::WriteError);
    }

    #[test]
    fn test_reason_carries_last_error() {
        let err = DispatchError::write(Some("broken pipe".into()));
        assert_eq!(
            err,
            DispatchError::Write {
                reason: "broken pipe".into()
            }
        );
    }

    #[test]
    fn test_stream_error_display() {
        let err = DispatchError::stream(Direction::Input, Some("timeout".into()));
        assert_eq!(err.to_string(), "input stream error: timeout");
        assert_eq!(err.kind(), ErrorKind::StreamError);
    }

    #[test]
    fn test_state_errors_are_invalid_state() {
        let err = DispatchError::NotOpen {
            state: DispatchState::Closed,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.to_string(), "dispatcher is not open (state: closed)");
    }
}
