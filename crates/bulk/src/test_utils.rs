//! Test utilities for the bulk transfer pipeline
//!
//! Provides [`MockBackend`], a scriptable [`TransferBackend`] that finishes
//! transfers in memory.
//!
//! # Example
//!
//! ```
//! use bulk::BulkSession;
//! use bulk::test_utils::MockBackend;
//! use std::time::Duration;
//!
//! let mut backend = MockBackend::new();
//! backend.finish_newest_first(true);
//!
//! let mut session = BulkSession::new(backend, 4).unwrap();
//! session.submit_write_buffer(2, vec![1, 2, 3], None).unwrap();
//! session.submit_read(6, None, 3, Some(Duration::from_millis(100))).unwrap();
//!
//! // The read finishes first on the "device", but the write is reported first
//! assert!(!session.await_completion().unwrap().is_read());
//! assert!(session.await_completion().unwrap().is_read());
//! ```

use crate::backend::{
    Direction, SubmitRejected, Ticket, TransferBackend, TransferOutcome, TransferRequest,
    TransferStatus,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::time::Duration;

/// What the mock saw for one accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransfer {
    pub ticket: Ticket,
    pub direction: Direction,
    pub endpoint: u8,
    pub length: usize,
    pub timeout: Duration,
    /// Outgoing bytes for writes, empty for reads
    pub data: Vec<u8>,
}

/// In-memory backend with scriptable failures
///
/// Each successful [`process_events`](TransferBackend::process_events) call
/// finishes one in-flight transfer, the oldest by default. Tickets are
/// numbered from 0 in submission order. Reads are filled with
/// [`read_byte`](MockBackend::read_byte) of their ticket unless scripted
/// otherwise.
#[derive(Debug, Default)]
pub struct MockBackend {
    in_flight: Vec<(Ticket, TransferRequest)>,
    finished: HashMap<Ticket, TransferOutcome>,
    next_ticket: u64,
    newest_first: bool,
    hold: bool,
    fail_cancel: bool,
    rejections: VecDeque<rusb::Error>,
    event_errors: VecDeque<rusb::Error>,
    statuses: HashMap<u64, TransferStatus>,
    actual_lengths: HashMap<u64, usize>,
    read_data: HashMap<u64, Vec<u8>>,
    submissions: Vec<SubmittedTransfer>,
    completion_log: Vec<Ticket>,
    cancelled: Vec<Ticket>,
    forgotten: Vec<Ticket>,
    process_calls: usize,
    last_event_wait: Option<Option<Duration>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte the mock writes into every position of a read's buffer
    pub fn read_byte(ticket: u64) -> u8 {
        0x40u8.wrapping_add(ticket as u8)
    }

    /// Finish the most recently submitted transfer first
    pub fn finish_newest_first(&mut self, enabled: bool) {
        self.newest_first = enabled;
    }

    /// Stop (or resume) finishing transfers in `process_events`
    pub fn hold_completions(&mut self, hold: bool) {
        self.hold = hold;
    }

    /// Make `cancel` fail without touching the transfer
    pub fn fail_cancel(&mut self, fail: bool) {
        self.fail_cancel = fail;
    }

    /// Reject the next submission with `error`
    pub fn reject_next_submit(&mut self, error: rusb::Error) {
        self.rejections.push_back(error);
    }

    /// Make the next `process_events` call fail with `error`
    pub fn push_event_error(&mut self, error: rusb::Error) {
        self.event_errors.push_back(error);
    }

    /// Finish ticket `ticket` with `status` instead of `Completed`
    pub fn set_status(&mut self, ticket: u64, status: TransferStatus) {
        self.statuses.insert(ticket, status);
    }

    /// Report `length` bytes transferred for ticket `ticket`
    pub fn set_actual_length(&mut self, ticket: u64, length: usize) {
        self.actual_lengths.insert(ticket, length);
    }

    /// Deliver `data` to read ticket `ticket`; the actual length follows it
    pub fn set_read_data(&mut self, ticket: u64, data: Vec<u8>) {
        self.read_data.insert(ticket, data);
    }

    pub fn submissions(&self) -> &[SubmittedTransfer] {
        &self.submissions
    }

    /// Tickets in the order the mock finished them
    pub fn completion_log(&self) -> &[Ticket] {
        &self.completion_log
    }

    pub fn cancelled(&self) -> &[Ticket] {
        &self.cancelled
    }

    pub fn forgotten(&self) -> &[Ticket] {
        &self.forgotten
    }

    /// Finished outcomes not yet reclaimed
    pub fn unreclaimed(&self) -> usize {
        self.finished.len()
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls
    }

    /// Wait budget passed to the most recent `process_events` call
    pub fn last_event_wait(&self) -> Option<Option<Duration>> {
        self.last_event_wait
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn finish(&mut self, ticket: Ticket, mut request: TransferRequest, status: TransferStatus) {
        let length = request.length;
        let mut actual_length = match status {
            TransferStatus::Completed => length,
            _ => 0,
        };

        if request.direction == Direction::In {
            match self.read_data.remove(&ticket.0) {
                Some(data) => {
                    let n = data.len().min(length);
                    request.buffer[..n].copy_from_slice(&data[..n]);
                    actual_length = n;
                }
                None if status == TransferStatus::Completed => {
                    request.buffer[..length].fill(Self::read_byte(ticket.0));
                }
                None => {}
            }
        }
        if let Some(forced) = self.actual_lengths.remove(&ticket.0) {
            actual_length = forced;
        }

        let completed = request.completed;
        if !self.forgotten.contains(&ticket) {
            self.finished.insert(
                ticket,
                TransferOutcome {
                    status,
                    buffer: request.buffer,
                    requested_length: length,
                    actual_length,
                },
            );
        }
        self.completion_log.push(ticket);
        completed.store(true, Ordering::Release);
    }
}

impl TransferBackend for MockBackend {
    fn submit(&mut self, request: TransferRequest) -> Result<Ticket, SubmitRejected> {
        if let Some(error) = self.rejections.pop_front() {
            return Err(SubmitRejected { error, request });
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let data = match request.direction {
            Direction::Out => request.buffer[..request.length].to_vec(),
            Direction::In => Vec::new(),
        };
        self.submissions.push(SubmittedTransfer {
            ticket,
            direction: request.direction,
            endpoint: request.endpoint,
            length: request.length,
            timeout: request.timeout,
            data,
        });
        self.in_flight.push((ticket, request));
        Ok(ticket)
    }

    fn cancel(&mut self, ticket: Ticket) -> Result<(), rusb::Error> {
        if self.fail_cancel {
            return Err(rusb::Error::NotSupported);
        }
        let position = self
            .in_flight
            .iter()
            .position(|(queued, _)| *queued == ticket)
            .ok_or(rusb::Error::NotFound)?;
        let (ticket, request) = self.in_flight.remove(position);
        self.cancelled.push(ticket);
        self.finish(ticket, request, TransferStatus::Cancelled);
        Ok(())
    }

    fn process_events(&mut self, timeout: Option<Duration>) -> Result<(), rusb::Error> {
        self.process_calls += 1;
        self.last_event_wait = Some(timeout);

        if let Some(error) = self.event_errors.pop_front() {
            return Err(error);
        }
        if self.hold || self.in_flight.is_empty() {
            return Ok(());
        }

        let index = if self.newest_first {
            self.in_flight.len() - 1
        } else {
            0
        };
        let (ticket, request) = self.in_flight.remove(index);
        let status = self
            .statuses
            .remove(&ticket.0)
            .unwrap_or(TransferStatus::Completed);
        self.finish(ticket, request, status);
        Ok(())
    }

    fn reclaim(&mut self, ticket: Ticket) -> Option<TransferOutcome> {
        self.finished.remove(&ticket)
    }

    /// Forgotten transfers stay in flight, like a device that cannot
    /// retract them, but their outcomes are discarded
    fn forget(&mut self, ticket: Ticket) {
        self.finished.remove(&ticket);
        self.forgotten.push(ticket);
    }
}
