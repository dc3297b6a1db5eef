//! Asynchronous USB bulk transfers
//!
//! This crate queues bulk transfers on a device and reports their
//! completions strictly in submission order. Transfer resources live in a
//! growable slot pool, so submitting never blocks and never allocates once
//! the pool is large enough.
//!
//! The device itself is reached through the [`TransferBackend`] trait;
//! [`RusbBackend`] implements it on top of a rusb device handle.
//!
//! # Example
//!
//! ```no_run
//! use bulk::{BulkSession, RusbBackend};
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let handle = rusb::open_device_with_vid_pid(0x1d50, 0x602b)
//!     .ok_or_else(|| anyhow::anyhow!("device not found"))?;
//! let mut session = BulkSession::new(RusbBackend::new(handle), 16)?;
//!
//! let buffer = session.prepare_write()?;
//! buffer[..5].copy_from_slice(&[0x80, 0x00, 0x00, 0x10, 0x00]);
//! session.submit_write(2, 5, None)?;
//! session.submit_read(6, None, 4096, Some(Duration::from_millis(9000)))?;
//!
//! let write = session.await_completion()?;
//! println!("wrote {} bytes", write.actual_length);
//! let read = session.await_completion()?;
//! println!("read {} bytes", read.data().len());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod completion;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod slot;
pub mod submit;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod usb;

pub use backend::{
    Direction, MAX_TRANSFER_SIZE, SubmitRejected, Ticket, TransferBackend, TransferOutcome,
    TransferRequest, TransferStatus,
};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use session::BulkSession;
pub use slot::{CompletionReport, TransferSlot, TransferSlotFactory};
pub use usb::RusbBackend;
