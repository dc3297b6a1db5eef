//! Bulk transfer session
//!
//! A [`BulkSession`] ties a slot pool to a [`TransferBackend`]. It is driven
//! by a single thread: submissions queue requests on the backend and commit
//! a slot each, and awaits release slots in submission order. Only the
//! awaits ([`await_completion`](BulkSession::await_completion) and
//! [`await_report`](BulkSession::await_report)) ever block.
//!
//! The submission and completion halves live in `submit.rs` and
//! `completion.rs`.

use crate::backend::TransferBackend;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::slot::TransferSlotFactory;
use pool::Pool;
use std::time::Duration;
use tracing::debug;

/// Default number of slots created up front
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Default per-transfer timeout for submissions without one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

pub struct BulkSession<B: TransferBackend> {
    pub(crate) pool: Pool<TransferSlotFactory>,
    pub(crate) backend: B,
    /// Wait budget per event-processing call (`None` = unbounded)
    pub(crate) event_wait: Option<Duration>,
    pub(crate) default_timeout: Duration,
}

impl<B: TransferBackend> BulkSession<B> {
    /// Create a session with `initial_capacity` eagerly allocated slots
    pub fn new(backend: B, initial_capacity: usize) -> Result<Self> {
        let pool = Pool::new(initial_capacity, TransferSlotFactory)?;
        debug!("Bulk session created with {} slots", initial_capacity);
        Ok(Self {
            pool,
            backend,
            event_wait: None,
            default_timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Create a session from loaded configuration
    pub fn with_config(backend: B, config: &SessionConfig) -> Result<Self> {
        let mut session = Self::new(backend, config.initial_capacity)?;
        session.event_wait = config.event_wait();
        session.default_timeout = config.default_timeout();
        Ok(session)
    }

    /// Number of submitted requests not yet awaited
    pub fn pending_count(&self) -> usize {
        self.pool.len()
    }

    /// Number of slots currently allocated
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Timeout used by submissions that pass `None`
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: TransferBackend> std::fmt::Debug for BulkSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkSession")
            .field("pool", &self.pool)
            .field("event_wait", &self.event_wait)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}
