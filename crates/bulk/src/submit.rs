//! Request submission
//!
//! Every submission follows the same sequence: check the length, reserve a
//! slot, hand the request to the backend, and commit the slot only if the
//! backend accepted it. A rejected request leaves the slot reserved but
//! uncommitted, so the next submission reuses it.

use crate::backend::{Direction, MAX_TRANSFER_SIZE, TransferBackend, TransferRequest};
use crate::error::{Error, Result};
use crate::session::BulkSession;
use crate::slot::TransferSlot;
use std::time::Duration;
use tracing::{debug, warn};

fn check_length(length: usize) -> Result<()> {
    if length > MAX_TRANSFER_SIZE {
        return Err(Error::Size {
            length,
            max: MAX_TRANSFER_SIZE,
        });
    }
    Ok(())
}

impl<B: TransferBackend> BulkSession<B> {
    /// Get the inline buffer of the next write slot
    ///
    /// Populate it in place and then call
    /// [`submit_write`](BulkSession::submit_write). The buffer is
    /// [`MAX_TRANSFER_SIZE`] bytes long. Preparing again before submitting
    /// returns the same buffer.
    pub fn prepare_write(&mut self) -> Result<&mut [u8]> {
        let slot = self.pool.reserve()?;
        Ok(slot.inline_buffer_mut())
    }

    /// Submit the first `length` bytes of the prepared write buffer
    ///
    /// A `timeout` of `None` uses the session's default timeout.
    pub fn submit_write(
        &mut self,
        endpoint: u8,
        length: usize,
        timeout: Option<Duration>,
    ) -> Result<()> {
        check_length(length)?;
        let endpoint = Direction::Out.endpoint_address(endpoint);
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.submit_with(|slot| slot.begin(Direction::Out, endpoint, length, timeout, None))
    }

    /// Submit a write of a caller-supplied buffer
    ///
    /// The buffer is recorded on the slot and is available from the
    /// completion report. If the backend rejects the write, the buffer comes
    /// back in [`Error::Submit`].
    pub fn submit_write_buffer(
        &mut self,
        endpoint: u8,
        data: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let length = data.len();
        check_length(length)?;
        let endpoint = Direction::Out.endpoint_address(endpoint);
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.submit_with(|slot| slot.begin(Direction::Out, endpoint, length, timeout, Some(data)))
    }

    /// Submit a read of `length` bytes
    ///
    /// Without a buffer the data lands in the slot's inline buffer; a
    /// supplied buffer is grown to `length` if needed and used instead.
    pub fn submit_read(
        &mut self,
        endpoint: u8,
        buffer: Option<Vec<u8>>,
        length: usize,
        timeout: Option<Duration>,
    ) -> Result<()> {
        check_length(length)?;
        let endpoint = Direction::In.endpoint_address(endpoint);
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.submit_with(|slot| slot.begin(Direction::In, endpoint, length, timeout, buffer))
    }

    fn submit_with<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce(&mut TransferSlot) -> TransferRequest,
    {
        let slot = self.pool.reserve()?;
        let request = build(slot);
        let (direction, endpoint, length) = (request.direction, request.endpoint, request.length);

        match self.backend.submit(request) {
            Ok(ticket) => {
                slot.mark_submitted(ticket);
                self.pool.commit_reserve();
                debug!(
                    "Submitted {:?} transfer: endpoint={:#x}, len={}, ticket={:?}, pending={}",
                    direction,
                    endpoint,
                    length,
                    ticket,
                    self.pool.len()
                );
                Ok(())
            }
            Err(rejected) => {
                warn!(
                    "Backend rejected {:?} transfer on endpoint {:#x}: {}",
                    direction, endpoint, rejected.error
                );
                Err(Error::Submit {
                    source: rejected.error,
                    buffer: slot.abandon(rejected.request),
                })
            }
        }
    }
}
