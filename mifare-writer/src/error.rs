//! Error types for card sessions

use thiserror::Error;

use crate::card::BlockAddress;
use crate::transport::Status;

/// Marker the legacy interface reported for unreadable blocks
pub const READ_FAILED_MARKER: &str = "ERROR: Read failed";

/// Errors raised while opening a session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("no readers: {0}")]
    NoReaders(String),

    #[error("reader mismatch: expected {expected}, available {available:?}")]
    ReaderMismatch {
        expected: String,
        available: Vec<String>,
    },

    #[error("connect failed: {0}")]
    ConnectFailed(String),
}

/// Errors from block operations on a session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The transport returned no data
    #[error("ERROR: Read failed")]
    ReadFailed,

    /// The transport returned its own error string instead of data
    #[error("{0}")]
    ReadRejected(String),

    #[error("write to block {block} failed with status {status}")]
    WriteRejected { block: BlockAddress, status: Status },

    #[error("block {0} is a sector trailer")]
    TrailerBlock(BlockAddress),

    #[error("block {block} is past the end of the card ({capacity} blocks)")]
    OutOfRange {
        block: BlockAddress,
        capacity: BlockAddress,
    },

    #[error("session is not connected")]
    NotConnected,

    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Check if this is a failed read as opposed to a misuse of the session
    pub fn is_read_failure(&self) -> bool {
        matches!(self, Self::ReadFailed | Self::ReadRejected(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
