//! Device capability consumed by the transfer pipeline
//!
//! A [`TransferBackend`] accepts bulk requests, processes device events, and
//! reports each finished request back by [`Ticket`]. The pipeline never talks
//! to a device directly; it only submits, cancels, polls and reclaims.
//!
//! Each request carries a shared completion flag. Event processing sets the
//! flag of every request it finishes, whichever request the caller is waiting
//! on, so the waiter can keep polling until its own flag flips.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Largest transfer accepted by the async API (64 KiB)
pub const MAX_TRANSFER_SIZE: usize = 0x10000;

/// Endpoint direction bit (set for IN endpoints)
const ENDPOINT_DIR_IN: u8 = 0x80;

/// Transfer direction, from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to host (read)
    In,
    /// Host to device (write)
    Out,
}

impl Direction {
    /// Direction encoded in bit 7 of an endpoint address
    pub fn of_endpoint(address: u8) -> Self {
        if address & ENDPOINT_DIR_IN != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    /// Build an endpoint address from an endpoint number
    pub fn endpoint_address(self, endpoint: u8) -> u8 {
        match self {
            Direction::In => endpoint | ENDPOINT_DIR_IN,
            Direction::Out => endpoint & !ENDPOINT_DIR_IN,
        }
    }

    pub fn is_read(self) -> bool {
        self == Direction::In
    }
}

/// Backend-side identifier of one submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// Terminal status of a finished transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    TimedOut,
    Stall,
    Overflow,
    NoDevice,
    Error,
    Cancelled,
    /// Status code the pipeline does not recognise
    Unknown(i32),
}

impl TransferStatus {
    /// Map the status to the caller-facing result
    pub fn into_result(self, transferred: usize) -> Result<()> {
        match self {
            TransferStatus::Completed => Ok(()),
            TransferStatus::TimedOut => Err(Error::TimedOut { transferred }),
            TransferStatus::Stall => Err(Error::Stall),
            TransferStatus::Overflow => Err(Error::Overflow),
            TransferStatus::NoDevice => Err(Error::NoDevice),
            TransferStatus::Error | TransferStatus::Cancelled => Err(Error::Io),
            TransferStatus::Unknown(code) => {
                Err(Error::Other(format!("Unrecognised transfer status {}", code)))
            }
        }
    }
}

/// A request handed to the backend
///
/// The buffer is lent to the backend for the lifetime of the request and
/// comes back in the [`TransferOutcome`] (or in [`SubmitRejected`]).
#[derive(Debug)]
pub struct TransferRequest {
    pub direction: Direction,
    /// Full endpoint address, direction bit included
    pub endpoint: u8,
    /// Outgoing data or incoming destination; at least `length` bytes long
    pub buffer: Vec<u8>,
    pub length: usize,
    pub timeout: Duration,
    /// Set by the backend once the request has finished
    pub completed: Arc<AtomicBool>,
}

/// Result fields of a finished request
#[derive(Debug)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    pub buffer: Vec<u8>,
    pub requested_length: usize,
    pub actual_length: usize,
}

/// A submission the backend refused, with the request handed back
#[derive(Debug)]
pub struct SubmitRejected {
    pub error: rusb::Error,
    pub request: TransferRequest,
}

/// The device capability: submit, cancel, poll, reclaim
pub trait TransferBackend {
    /// Queue a request. On failure the request is returned untouched.
    fn submit(&mut self, request: TransferRequest) -> std::result::Result<Ticket, SubmitRejected>;

    /// Ask for an in-flight request to be aborted
    ///
    /// A cancelled request still finishes through event processing, with
    /// status [`TransferStatus::Cancelled`].
    fn cancel(&mut self, ticket: Ticket) -> std::result::Result<(), rusb::Error>;

    /// Process pending device events, waiting at most `timeout` (`None` waits
    /// indefinitely). `rusb::Error::Interrupted` means the call may be retried.
    fn process_events(&mut self, timeout: Option<Duration>) -> std::result::Result<(), rusb::Error>;

    /// Collect the outcome of a finished request
    ///
    /// Returns `None` if the ticket is unknown or has not finished yet.
    fn reclaim(&mut self, ticket: Ticket) -> Option<TransferOutcome>;

    /// Give up on a request whose outcome will never be reclaimed
    ///
    /// Called when event processing failed before the request finished.
    /// The backend drops any outcome it holds for the ticket, now or when
    /// the request eventually finishes.
    fn forget(&mut self, ticket: Ticket);
}
