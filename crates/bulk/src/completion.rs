//! Completion handling
//!
//! Requests complete in submission order. Awaiting the oldest request drives
//! the backend's event processing until that request's completion flag is
//! set. Later requests may finish during the same calls; their flags are set
//! as well and they are picked up by subsequent awaits.

use crate::backend::{Ticket, TransferBackend};
use crate::error::{Error, Result};
use crate::session::BulkSession;
use crate::slot::{CompletionReport, TransferSlot};
use std::time::Duration;
use tracing::{debug, trace, warn};

impl<B: TransferBackend> BulkSession<B> {
    /// Wait for the oldest outstanding request and report on it
    ///
    /// The request's slot is released whatever the outcome. Transfer
    /// failures (timeout, stall, disconnect, ...) are returned as errors;
    /// use [`await_report`](BulkSession::await_report) to inspect the data
    /// of a failed transfer. An unrecoverable event-processing failure
    /// cancels the request and returns [`Error::AsyncEvent`].
    pub fn await_completion(&mut self) -> Result<CompletionReport<'_>> {
        let report = self.await_report()?;
        report.result()?;
        Ok(report)
    }

    /// Wait for the oldest outstanding request and report on it, whatever
    /// its transfer status
    ///
    /// Only [`Error::EmptyQueue`] and [`Error::AsyncEvent`] are returned as
    /// errors. A timed-out read, for instance, yields a report whose
    /// [`data`](CompletionReport::data) holds the bytes received before the
    /// timeout and whose [`result`](CompletionReport::result) is the error.
    pub fn await_report(&mut self) -> Result<CompletionReport<'_>> {
        let event_wait = self.event_wait;
        let slot = self.pool.take()?;

        let waited = wait_for(&mut self.backend, slot, event_wait);
        let ticket = slot.take_ticket();
        match ticket.and_then(|ticket| self.backend.reclaim(ticket)) {
            Some(outcome) => slot.finish(outcome),
            None => {
                warn!("Transfer outcome could not be reclaimed from the backend");
                if let Some(ticket) = ticket {
                    self.backend.forget(ticket);
                }
                slot.forfeit();
            }
        }

        let slot = self.pool.commit_take();
        waited?;

        let report = slot.report();
        debug!(
            "{} completed: requested {}, actually transferred {}, status {:?}",
            if report.is_read() { "Read" } else { "Write" },
            report.requested_length,
            report.actual_length,
            report.status
        );
        Ok(report)
    }

    /// Await every outstanding request
    ///
    /// Individual transfer failures are logged and skipped. Returns the
    /// number of transfers that completed successfully, or stops at the
    /// first event-processing failure.
    pub fn drain(&mut self) -> Result<usize> {
        let mut completed = 0;
        while self.pending_count() > 0 {
            match self.await_completion() {
                Ok(_) => completed += 1,
                Err(err @ Error::AsyncEvent(_)) => return Err(err),
                Err(err) => warn!("Transfer failed while draining: {}", err),
            }
        }
        Ok(completed)
    }
}

/// Poll until the slot's flag is set
///
/// An interrupted poll is retried. Any other failure cancels the slot's
/// request and keeps polling until the cancellation lands or polling fails
/// again; the original failure is returned either way.
fn wait_for<B: TransferBackend>(
    backend: &mut B,
    slot: &TransferSlot,
    event_wait: Option<Duration>,
) -> Result<()> {
    while !slot.is_complete() {
        match backend.process_events(event_wait) {
            Ok(()) => {}
            Err(rusb::Error::Interrupted) => {
                trace!("Event processing interrupted, retrying");
            }
            Err(err) => {
                warn!("Event processing failed: {}, cancelling transfer", err);
                cancel_and_drain(backend, slot, slot.ticket(), event_wait);
                return Err(Error::AsyncEvent(err));
            }
        }
    }
    Ok(())
}

fn cancel_and_drain<B: TransferBackend>(
    backend: &mut B,
    slot: &TransferSlot,
    ticket: Option<Ticket>,
    event_wait: Option<Duration>,
) {
    if let Some(ticket) = ticket {
        if let Err(err) = backend.cancel(ticket) {
            debug!("Cancelling {:?} failed: {}", ticket, err);
        }
    }

    while !slot.is_complete() {
        match backend.process_events(event_wait) {
            Ok(()) | Err(rusb::Error::Interrupted) => {}
            Err(err) => {
                warn!("Event processing failed while draining cancelled transfer: {}", err);
                break;
            }
        }
    }
}
