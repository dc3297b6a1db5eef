//! rusb-backed transfer backend
//!
//! rusb exposes bulk transfers as blocking calls, so submission only queues
//! the request. Each [`process_events`](TransferBackend::process_events) call
//! executes the oldest queued request with the request's own timeout, stores
//! its outcome, and sets its completion flag. Requests therefore reach the
//! device in submission order.

use crate::backend::{
    Direction, SubmitRejected, Ticket, TransferBackend, TransferOutcome, TransferRequest,
    TransferStatus,
};
use crate::usb::transfers::execute_bulk_transfer;
use rusb::{DeviceHandle, UsbContext};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ticket bookkeeping for deferred execution, independent of the device
#[derive(Debug, Default)]
struct TransferQueue {
    queue: VecDeque<(Ticket, TransferRequest)>,
    finished: HashMap<Ticket, TransferOutcome>,
    next_ticket: u64,
    /// Set once a transfer reports the device gone
    disconnected: bool,
}

impl TransferQueue {
    fn submit(&mut self, request: TransferRequest) -> Result<Ticket, SubmitRejected> {
        if self.disconnected {
            return Err(SubmitRejected {
                error: rusb::Error::NoDevice,
                request,
            });
        }
        if Direction::of_endpoint(request.endpoint) != request.direction
            || request.length > request.buffer.len()
        {
            return Err(SubmitRejected {
                error: rusb::Error::InvalidParam,
                request,
            });
        }

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.queue.push_back((ticket, request));
        Ok(ticket)
    }

    fn cancel(&mut self, ticket: Ticket) -> Result<(), rusb::Error> {
        let position = self
            .queue
            .iter()
            .position(|(queued, _)| *queued == ticket)
            .ok_or(rusb::Error::NotFound)?;

        if let Some((ticket, request)) = self.queue.remove(position) {
            debug!("Cancelled queued transfer {:?}", ticket);
            self.complete(ticket, request, TransferStatus::Cancelled, 0);
        }
        Ok(())
    }

    /// Execute the oldest queued request; `false` if nothing was queued
    fn run_next<F>(&mut self, execute: F) -> bool
    where
        F: FnOnce(&mut TransferRequest) -> (TransferStatus, usize),
    {
        let Some((ticket, mut request)) = self.queue.pop_front() else {
            return false;
        };

        let (status, actual_length) = if self.disconnected {
            (TransferStatus::NoDevice, 0)
        } else {
            execute(&mut request)
        };
        self.complete(ticket, request, status, actual_length);
        true
    }

    fn reclaim(&mut self, ticket: Ticket) -> Option<TransferOutcome> {
        self.finished.remove(&ticket)
    }

    fn forget(&mut self, ticket: Ticket) {
        if let Some(position) = self.queue.iter().position(|(queued, _)| *queued == ticket) {
            self.queue.remove(position);
            debug!("Dropped unexecuted transfer {:?}", ticket);
        } else if self.finished.remove(&ticket).is_some() {
            debug!("Dropped unreclaimed outcome of {:?}", ticket);
        }
    }

    fn complete(
        &mut self,
        ticket: Ticket,
        request: TransferRequest,
        status: TransferStatus,
        actual_length: usize,
    ) {
        if status == TransferStatus::NoDevice && !self.disconnected {
            info!("Device disconnected, rejecting further submissions");
            self.disconnected = true;
        }

        let completed = request.completed;
        self.finished.insert(
            ticket,
            TransferOutcome {
                status,
                buffer: request.buffer,
                requested_length: request.length,
                actual_length,
            },
        );
        completed.store(true, Ordering::Release);
    }
}

pub struct RusbBackend<T: UsbContext> {
    handle: DeviceHandle<T>,
    transfers: TransferQueue,
}

impl<T: UsbContext> RusbBackend<T> {
    /// Wrap an opened device handle with its interface already claimed
    pub fn new(handle: DeviceHandle<T>) -> Self {
        Self {
            handle,
            transfers: TransferQueue::default(),
        }
    }

    pub fn handle(&self) -> &DeviceHandle<T> {
        &self.handle
    }

    /// Number of submitted requests not yet executed
    pub fn queued(&self) -> usize {
        self.transfers.queue.len()
    }

    pub fn is_disconnected(&self) -> bool {
        self.transfers.disconnected
    }

    /// Give the device handle back, dropping any unexecuted requests
    pub fn into_handle(self) -> DeviceHandle<T> {
        if !self.transfers.queue.is_empty() {
            warn!(
                "Releasing device handle with {} unexecuted transfers",
                self.transfers.queue.len()
            );
        }
        self.handle
    }
}

impl<T: UsbContext> TransferBackend for RusbBackend<T> {
    fn submit(&mut self, request: TransferRequest) -> Result<Ticket, SubmitRejected> {
        self.transfers.submit(request)
    }

    fn cancel(&mut self, ticket: Ticket) -> Result<(), rusb::Error> {
        self.transfers.cancel(ticket)
    }

    fn process_events(&mut self, _timeout: Option<Duration>) -> Result<(), rusb::Error> {
        // Each transfer carries its own timeout, which bounds the wait.
        let handle = &self.handle;
        self.transfers.run_next(|request| execute_bulk_transfer(handle, request));
        Ok(())
    }

    fn reclaim(&mut self, ticket: Ticket) -> Option<TransferOutcome> {
        self.transfers.reclaim(ticket)
    }

    fn forget(&mut self, ticket: Ticket) {
        self.transfers.forget(ticket)
    }
}
