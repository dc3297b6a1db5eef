//! Bulk transfer execution
//!
//! Runs one queued request against a rusb device handle and maps the rusb
//! outcome to a [`TransferStatus`].

use crate::backend::{Direction, TransferRequest, TransferStatus};
use rusb::{DeviceHandle, UsbContext};
use tracing::{debug, warn};

/// Execute a bulk transfer, returning its status and the bytes moved
///
/// IN transfers read into the first `length` bytes of the request buffer;
/// OUT transfers send them.
pub fn execute_bulk_transfer<T: UsbContext>(
    handle: &DeviceHandle<T>,
    request: &mut TransferRequest,
) -> (TransferStatus, usize) {
    let length = request.length.min(request.buffer.len());

    debug!(
        "Bulk transfer: endpoint={:#x}, len={}, timeout={}ms, is_in={}",
        request.endpoint,
        length,
        request.timeout.as_millis(),
        request.direction.is_read()
    );

    let result = match request.direction {
        Direction::In => handle.read_bulk(
            request.endpoint,
            &mut request.buffer[..length],
            request.timeout,
        ),
        Direction::Out => {
            handle.write_bulk(request.endpoint, &request.buffer[..length], request.timeout)
        }
    };

    match result {
        Ok(transferred) => {
            debug!("Bulk transfer succeeded: {} bytes", transferred);
            (TransferStatus::Completed, transferred)
        }
        Err(e) => {
            warn!(
                "Bulk transfer on endpoint {:#x} failed: {}",
                request.endpoint, e
            );
            (map_rusb_error(e), 0)
        }
    }
}

/// Map a rusb error from a synchronous transfer to a transfer status
pub fn map_rusb_error(err: rusb::Error) -> TransferStatus {
    match err {
        rusb::Error::Timeout => TransferStatus::TimedOut,
        rusb::Error::Pipe => TransferStatus::Stall,
        rusb::Error::Overflow => TransferStatus::Overflow,
        rusb::Error::NoDevice => TransferStatus::NoDevice,
        _ => TransferStatus::Error,
    }
}
