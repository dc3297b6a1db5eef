//! Reusable transfer slots
//!
//! A [`TransferSlot`] is the unit recycled by the session's pool. It owns a
//! 64 KiB inline buffer that two-phase writes and buffer-less reads use
//! directly. A caller-supplied buffer can be attached instead; it is parked
//! on the slot after completion so the report can expose it, and dropped
//! when the slot is next reused.
//!
//! While a request is in flight its buffer is lent to the backend, so the
//! slot holds no buffer of its own until the outcome is reclaimed.

use crate::backend::{
    Direction, MAX_TRANSFER_SIZE, Ticket, TransferOutcome, TransferRequest, TransferStatus,
};
use crate::error::Result;
use pool::SlotFactory;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::trace;

#[derive(Debug)]
pub struct TransferSlot {
    /// 64 KiB scratch space; `None` while lent to the backend
    inline: Option<Vec<u8>>,
    /// Caller buffer attached to the current or last transfer
    external: Option<Vec<u8>>,
    uses_external: bool,
    direction: Direction,
    endpoint: u8,
    requested_length: usize,
    actual_length: usize,
    status: TransferStatus,
    completed: Arc<AtomicBool>,
    ticket: Option<Ticket>,
}

impl TransferSlot {
    fn new(inline: Vec<u8>) -> Self {
        Self {
            inline: Some(inline),
            external: None,
            uses_external: false,
            direction: Direction::Out,
            endpoint: 0,
            requested_length: 0,
            actual_length: 0,
            status: TransferStatus::Completed,
            completed: Arc::new(AtomicBool::new(false)),
            ticket: None,
        }
    }

    /// The inline buffer, for in-place population before a write
    pub fn inline_buffer_mut(&mut self) -> &mut [u8] {
        self.inline
            .get_or_insert_with(|| vec![0; MAX_TRANSFER_SIZE])
            .as_mut_slice()
    }

    /// Reset the slot for a new transfer and build the backend request
    ///
    /// With `external == None` the inline buffer is lent to the request.
    pub(crate) fn begin(
        &mut self,
        direction: Direction,
        endpoint: u8,
        length: usize,
        timeout: Duration,
        external: Option<Vec<u8>>,
    ) -> TransferRequest {
        self.direction = direction;
        self.endpoint = endpoint;
        self.requested_length = length;
        self.actual_length = 0;
        self.status = TransferStatus::Completed;
        self.ticket = None;
        self.completed.store(false, Ordering::Release);

        let buffer = match external {
            Some(mut buffer) => {
                if buffer.len() < length {
                    buffer.resize(length, 0);
                }
                self.uses_external = true;
                self.external = None;
                buffer
            }
            None => {
                self.uses_external = false;
                self.external = None;
                self.inline
                    .take()
                    .unwrap_or_else(|| vec![0; MAX_TRANSFER_SIZE])
            }
        };

        TransferRequest {
            direction,
            endpoint,
            buffer,
            length,
            timeout,
            completed: self.completed.clone(),
        }
    }

    pub(crate) fn mark_submitted(&mut self, ticket: Ticket) {
        trace!("Slot now tracks ticket {:?}", ticket);
        self.ticket = Some(ticket);
    }

    /// Take the buffer back from a rejected request
    ///
    /// The inline buffer returns to the slot; a caller buffer is returned so
    /// it can be handed back.
    pub(crate) fn abandon(&mut self, request: TransferRequest) -> Option<Vec<u8>> {
        if self.uses_external {
            self.uses_external = false;
            Some(request.buffer)
        } else {
            self.inline = Some(request.buffer);
            None
        }
    }

    /// Record a reclaimed outcome and return its buffer to the slot
    pub(crate) fn finish(&mut self, outcome: TransferOutcome) {
        self.status = outcome.status;
        self.actual_length = outcome.actual_length.min(self.requested_length);
        self.restore_buffer(outcome.buffer);
    }

    /// Mark the transfer as lost to the backend
    ///
    /// Used when the outcome cannot be reclaimed. The backend may still
    /// finish the lost request later, so the slot stops sharing its flag.
    /// A fresh inline buffer is allocated on the slot's next use.
    pub(crate) fn forfeit(&mut self) {
        self.status = TransferStatus::Error;
        self.actual_length = 0;
        self.ticket = None;
        self.completed = Arc::new(AtomicBool::new(false));
    }

    fn restore_buffer(&mut self, buffer: Vec<u8>) {
        if self.uses_external {
            self.external = Some(buffer);
        } else {
            self.inline = Some(buffer);
        }
    }

    pub(crate) fn ticket(&self) -> Option<Ticket> {
        self.ticket
    }

    pub(crate) fn take_ticket(&mut self) -> Option<Ticket> {
        self.ticket.take()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Describe the last finished transfer
    pub fn report(&self) -> CompletionReport<'_> {
        let storage = if self.uses_external {
            self.external.as_deref()
        } else {
            self.inline.as_deref()
        };
        let buffer = storage
            .map(|buf| &buf[..self.requested_length.min(buf.len())])
            .unwrap_or(&[]);

        CompletionReport {
            buffer,
            requested_length: self.requested_length,
            actual_length: self.actual_length,
            direction: self.direction,
            endpoint: self.endpoint,
            status: self.status,
        }
    }
}

/// Summary of one finished transfer
///
/// Borrows the session, so the buffer cannot be reused while the report is
/// alive.
#[derive(Debug, Clone, Copy)]
pub struct CompletionReport<'a> {
    /// The transfer buffer, `requested_length` bytes long
    pub buffer: &'a [u8],
    pub requested_length: usize,
    pub actual_length: usize,
    pub direction: Direction,
    /// Endpoint address, direction bit included
    pub endpoint: u8,
    pub status: TransferStatus,
}

impl<'a> CompletionReport<'a> {
    /// The bytes actually transferred
    pub fn data(&self) -> &'a [u8] {
        &self.buffer[..self.actual_length.min(self.buffer.len())]
    }

    pub fn is_read(&self) -> bool {
        self.direction.is_read()
    }

    /// The transfer status as a caller-facing result
    pub fn result(&self) -> Result<()> {
        self.status.into_result(self.actual_length)
    }
}

/// Creates transfer slots with a zeroed 64 KiB inline buffer
#[derive(Debug, Default)]
pub struct TransferSlotFactory;

impl SlotFactory for TransferSlotFactory {
    type Item = TransferSlot;

    fn create(&mut self) -> Option<TransferSlot> {
        let mut inline = Vec::new();
        inline.try_reserve_exact(MAX_TRANSFER_SIZE).ok()?;
        inline.resize(MAX_TRANSFER_SIZE, 0);
        Some(TransferSlot::new(inline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> TransferSlot {
        TransferSlotFactory.create().unwrap()
    }

    #[test]
    fn test_factory_allocates_inline_buffer() {
        let mut slot = slot();
        assert_eq!(slot.inline_buffer_mut().len(), MAX_TRANSFER_SIZE);
        assert!(slot.ticket().is_none());
    }

    #[test]
    fn test_inline_request_round_trip() {
        let mut slot = slot();
        slot.inline_buffer_mut()[..3].copy_from_slice(&[1, 2, 3]);

        let request = slot.begin(Direction::Out, 0x02, 3, Duration::from_millis(100), None);
        assert_eq!(&request.buffer[..3], &[1, 2, 3]);
        assert!(slot.inline.is_none());

        request.completed.store(true, Ordering::Release);
        assert!(slot.is_complete());

        slot.finish(TransferOutcome {
            status: TransferStatus::Completed,
            buffer: request.buffer,
            requested_length: 3,
            actual_length: 3,
        });
        let report = slot.report();
        assert_eq!(report.data(), &[1, 2, 3]);
        assert_eq!(report.endpoint, 0x02);
        assert!(!report.is_read());
    }

    #[test]
    fn test_external_buffer_is_resized_and_parked() {
        let mut slot = slot();
        let request = slot.begin(
            Direction::In,
            0x86,
            8,
            Duration::from_millis(100),
            Some(vec![0xAA; 4]),
        );
        assert_eq!(request.buffer.len(), 8);

        let mut buffer = request.buffer;
        buffer[..5].copy_from_slice(b"hello");
        slot.finish(TransferOutcome {
            status: TransferStatus::Completed,
            buffer,
            requested_length: 8,
            actual_length: 5,
        });

        // Inline buffer was never lent
        assert!(slot.inline.is_some());
        let report = slot.report();
        assert_eq!(report.data(), b"hello");
        assert_eq!(report.buffer.len(), 8);
        assert!(report.is_read());
    }

    #[test]
    fn test_abandon_restores_buffer() {
        let mut slot = slot();
        let request = slot.begin(Direction::Out, 0x02, 16, Duration::ZERO, None);
        assert!(slot.abandon(request).is_none());
        assert_eq!(slot.inline_buffer_mut().len(), MAX_TRANSFER_SIZE);
    }

    #[test]
    fn test_abandon_hands_back_external_buffer() {
        let mut slot = slot();
        let request = slot.begin(Direction::Out, 0x02, 3, Duration::ZERO, Some(vec![4, 5, 6]));
        assert_eq!(slot.abandon(request), Some(vec![4, 5, 6]));
        assert!(slot.external.is_none());
        assert!(slot.inline.is_some());
    }

    #[test]
    fn test_forfeit_reallocates_inline_lazily() {
        let mut slot = slot();
        let lost = slot.begin(Direction::In, 0x81, 64, Duration::ZERO, None);
        slot.forfeit();
        assert_eq!(slot.report().status, TransferStatus::Error);

        // A late completion of the lost request must not reach the slot
        lost.completed.store(true, Ordering::Release);
        assert!(!slot.is_complete());
        assert!(slot.report().buffer.is_empty());
        assert_eq!(slot.inline_buffer_mut().len(), MAX_TRANSFER_SIZE);
    }

    #[test]
    fn test_actual_length_is_clamped() {
        let mut slot = slot();
        let request = slot.begin(Direction::In, 0x81, 4, Duration::ZERO, None);
        slot.finish(TransferOutcome {
            status: TransferStatus::Overflow,
            buffer: request.buffer,
            requested_length: 4,
            actual_length: 512,
        });
        assert_eq!(slot.report().actual_length, 4);
        assert!(matches!(slot.report().result(), Err(crate::Error::Overflow)));
    }
}
