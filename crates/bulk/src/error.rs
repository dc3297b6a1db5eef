//! Bulk transfer error types

use pool::PoolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Slot storage could not be allocated; the session is unchanged
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// Transfer length exceeds the per-transfer ceiling
    #[error("Transfer of {length} bytes exceeds the {max}-byte limit")]
    Size { length: usize, max: usize },

    /// Await called with nothing outstanding
    #[error("No outstanding requests to await")]
    EmptyQueue,

    /// The backend rejected the submission; the slot is free for a retry
    ///
    /// A caller-supplied buffer is handed back in `buffer`.
    #[error("Async submission failed: {source}")]
    Submit {
        #[source]
        source: rusb::Error,
        buffer: Option<Vec<u8>>,
    },

    /// Event processing failed unrecoverably
    #[error("Async event processing failed: {0}")]
    AsyncEvent(#[source] rusb::Error),

    #[error("Transfer timed out after {transferred} bytes")]
    TimedOut { transferred: usize },

    /// Endpoint halted (protocol error)
    #[error("Endpoint stalled")]
    Stall,

    #[error("Device sent more data than requested")]
    Overflow,

    #[error("Device was disconnected")]
    NoDevice,

    /// Transfer failed or was cancelled
    #[error("Transfer I/O error")]
    Io,

    #[error("Other error: {0}")]
    Other(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::EmptyQueue => Error::EmptyQueue,
            alloc @ PoolError::Allocation { .. } => Error::Allocation(alloc.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pool_error() {
        assert!(matches!(
            Error::from(PoolError::EmptyQueue),
            Error::EmptyQueue
        ));

        let err = Error::from(PoolError::Allocation {
            requested: 8,
            created: 3,
        });
        match err {
            Error::Allocation(msg) => assert!(msg.contains("8 slots")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_size_error_display() {
        let err = Error::Size {
            length: 65537,
            max: 65536,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("65537"));
        assert!(msg.contains("65536-byte limit"));
    }

    #[test]
    fn test_submit_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::Submit {
            source: rusb::Error::Busy,
            buffer: None,
        };
        assert!(err.source().is_some());
        assert!(format!("{}", err).contains("Async submission failed"));
    }
}
