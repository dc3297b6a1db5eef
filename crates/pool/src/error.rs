//! Pool error types

use thiserror::Error;

/// Errors returned by [`Pool`](crate::Pool) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Backing storage or a slot could not be allocated
    #[error("Allocation failed: could not provide {requested} slots ({created} created)")]
    Allocation { requested: usize, created: usize },

    /// A take was attempted with no committed slots
    #[error("Attempt to take an item from an empty queue")]
    EmptyQueue,
}

/// Type alias for pool results
pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_error_display() {
        let err = PoolError::Allocation {
            requested: 9,
            created: 8,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Allocation failed"));
        assert!(msg.contains("9 slots"));
        assert!(msg.contains("8 created"));
    }

    #[test]
    fn test_empty_queue_display() {
        let msg = format!("{}", PoolError::EmptyQueue);
        assert!(msg.contains("empty queue"));
    }
}
