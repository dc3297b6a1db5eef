//! Bulk Session Integration Tests
//!
//! Drives a `BulkSession` against the scriptable `MockBackend`.
//!
//! # Test Scenarios
//! - Completions are reported in submission order
//! - Failed submissions leave the pool reusable
//! - Event-processing failures, interruptions and cancellation
//! - Transfer status mapping and slot release on every path
//! - Pool growth under load
//!
//! Run with: `cargo test -p bulk --test session_tests`

use bulk::test_utils::MockBackend;
use bulk::{
    BulkSession, Direction, Error, MAX_TRANSFER_SIZE, SessionConfig, Ticket, TransferStatus,
};
use std::time::Duration;

const TIMEOUT: Option<Duration> = Some(Duration::from_millis(1000));

fn session(capacity: usize) -> BulkSession<MockBackend> {
    BulkSession::new(MockBackend::new(), capacity).expect("Failed to create session")
}

// ============================================================================
// Ordering Tests
// ============================================================================

#[test]
fn test_write_then_read_reported_in_submission_order() {
    let mut backend = MockBackend::new();
    backend.finish_newest_first(true);
    let mut session = BulkSession::new(backend, 4).unwrap();

    let buffer = session.prepare_write().unwrap();
    buffer[..5].copy_from_slice(&[0x80, 0x00, 0x00, 0x10, 0x00]);
    session.submit_write(2, 5, TIMEOUT).unwrap();
    session.submit_read(6, None, 16, TIMEOUT).unwrap();
    assert_eq!(session.pending_count(), 2);

    {
        let write = session.await_completion().unwrap();
        assert_eq!(write.direction, Direction::Out);
        assert_eq!(write.endpoint, 0x02);
        assert_eq!(write.data(), &[0x80, 0x00, 0x00, 0x10, 0x00]);
    }

    // The read physically finished before the write
    assert_eq!(session.backend().completion_log(), &[Ticket(1), Ticket(0)]);
    let calls = session.backend().process_calls();

    let read = session.await_completion().unwrap();
    assert_eq!(read.direction, Direction::In);
    assert_eq!(read.endpoint, 0x86);
    assert_eq!(read.requested_length, 16);
    assert_eq!(read.data(), &[MockBackend::read_byte(1); 16]);

    // Its flag was already set, so no further event processing was needed
    assert_eq!(session.backend().process_calls(), calls);
    assert_eq!(session.pending_count(), 0);
}

#[test]
fn test_many_transfers_complete_in_order_across_growth() {
    let mut backend = MockBackend::new();
    backend.finish_newest_first(true);
    let mut session = BulkSession::new(backend, 2).unwrap();

    for i in 0..10u8 {
        session.submit_write_buffer(1, vec![i; 4], TIMEOUT).unwrap();
    }
    assert_eq!(session.pending_count(), 10);
    assert_eq!(session.capacity(), 16);

    for i in 0..10u8 {
        let report = session.await_completion().unwrap();
        assert_eq!(report.data(), &[i; 4]);
    }
    assert_eq!(session.pending_count(), 0);
    assert_eq!(session.capacity(), 16);
}

#[test]
fn test_interleaved_submit_and_await() {
    let mut session = session(2);

    session.submit_write_buffer(1, vec![1], TIMEOUT).unwrap();
    session.submit_write_buffer(1, vec![2], TIMEOUT).unwrap();
    assert_eq!(session.await_completion().unwrap().data(), &[1]);

    session.submit_write_buffer(1, vec![3], TIMEOUT).unwrap();
    assert_eq!(session.capacity(), 2);
    assert_eq!(session.await_completion().unwrap().data(), &[2]);
    assert_eq!(session.await_completion().unwrap().data(), &[3]);
}

// ============================================================================
// Submission Tests
// ============================================================================

#[test]
fn test_failed_submission_is_retryable() {
    let mut backend = MockBackend::new();
    backend.reject_next_submit(rusb::Error::Busy);
    let mut session = BulkSession::new(backend, 4).unwrap();

    session.prepare_write().unwrap()[..3].copy_from_slice(b"abc");
    let result = session.submit_write(2, 3, TIMEOUT);
    assert!(matches!(
        result,
        Err(Error::Submit {
            source: rusb::Error::Busy,
            buffer: None
        })
    ));
    assert_eq!(session.pending_count(), 0);

    // The same slot, with its prepared contents, is reused by the retry
    session.submit_write(2, 3, TIMEOUT).unwrap();
    assert_eq!(session.pending_count(), 1);
    assert_eq!(session.backend().submissions().len(), 1);
    assert_eq!(session.backend().submissions()[0].data, b"abc");

    assert_eq!(session.await_completion().unwrap().data(), b"abc");
}

#[test]
fn test_failed_external_submission_is_retryable() {
    let mut backend = MockBackend::new();
    backend.reject_next_submit(rusb::Error::NoMem);
    let mut session = BulkSession::new(backend, 1).unwrap();

    let data = match session.submit_write_buffer(2, vec![9; 8], TIMEOUT) {
        Err(Error::Submit {
            source: rusb::Error::NoMem,
            buffer: Some(data),
        }) => data,
        other => panic!("expected the rejected buffer back, got {:?}", other),
    };
    assert_eq!(session.pending_count(), 0);

    // Resubmitting the returned buffer sends the original bytes
    session.submit_write_buffer(2, data, TIMEOUT).unwrap();
    assert_eq!(session.pending_count(), 1);
    assert_eq!(session.capacity(), 1);
    assert_eq!(session.backend().submissions()[0].data, vec![9; 8]);
    assert_eq!(session.await_completion().unwrap().data(), &[9; 8]);
}

#[test]
fn test_max_size_transfer_accepted() {
    let mut session = session(1);
    session.submit_read(6, None, MAX_TRANSFER_SIZE, TIMEOUT).unwrap();
    let report = session.await_completion().unwrap();
    assert_eq!(report.actual_length, MAX_TRANSFER_SIZE);
}

#[test]
fn test_oversized_transfer_rejected() {
    let mut session = session(1);
    let result = session.submit_read(6, None, MAX_TRANSFER_SIZE + 1, TIMEOUT);
    assert!(matches!(result, Err(Error::Size { .. })));
    assert_eq!(session.pending_count(), 0);
    assert!(session.backend().submissions().is_empty());
}

#[test]
fn test_read_into_external_buffer() {
    let mut backend = MockBackend::new();
    backend.set_read_data(0, b"status".to_vec());
    let mut session = BulkSession::new(backend, 2).unwrap();

    session
        .submit_read(1, Some(Vec::with_capacity(64)), 64, TIMEOUT)
        .unwrap();
    let report = session.await_completion().unwrap();
    assert!(report.is_read());
    assert_eq!(report.requested_length, 64);
    assert_eq!(report.actual_length, 6);
    assert_eq!(report.data(), b"status");
    assert_eq!(report.buffer.len(), 64);
}

// ============================================================================
// Completion Failure Tests
// ============================================================================

#[test]
fn test_await_with_nothing_outstanding() {
    let mut session = session(2);
    assert!(matches!(session.await_completion(), Err(Error::EmptyQueue)));
    assert_eq!(session.pending_count(), 0);
}

#[test]
fn test_interrupted_event_wait_is_retried() {
    let mut backend = MockBackend::new();
    backend.push_event_error(rusb::Error::Interrupted);
    backend.push_event_error(rusb::Error::Interrupted);
    let mut session = BulkSession::new(backend, 2).unwrap();

    session.submit_read(6, None, 4, TIMEOUT).unwrap();
    let report = session.await_completion().unwrap();
    assert_eq!(report.actual_length, 4);
    assert_eq!(session.backend().process_calls(), 3);
    assert!(session.backend().cancelled().is_empty());
}

#[test]
fn test_event_failure_cancels_and_releases_slot() {
    let mut backend = MockBackend::new();
    backend.push_event_error(rusb::Error::Io);
    let mut session = BulkSession::new(backend, 2).unwrap();

    session.submit_read(6, None, 4, TIMEOUT).unwrap();
    session.submit_read(6, None, 4, TIMEOUT).unwrap();

    let result = session.await_completion();
    assert!(matches!(result, Err(Error::AsyncEvent(rusb::Error::Io))));
    assert_eq!(session.backend().cancelled(), &[Ticket(0)]);
    assert_eq!(session.pending_count(), 1);

    // The next request is unaffected
    let report = session.await_completion().unwrap();
    assert_eq!(report.data(), &[MockBackend::read_byte(1); 4]);
}

#[test]
fn test_event_failure_with_failed_cancel_still_drains() {
    let mut backend = MockBackend::new();
    backend.push_event_error(rusb::Error::Other);
    backend.fail_cancel(true);
    let mut session = BulkSession::new(backend, 2).unwrap();

    session.submit_write_buffer(2, vec![1, 2, 3], TIMEOUT).unwrap();
    let result = session.await_completion();
    assert!(matches!(result, Err(Error::AsyncEvent(rusb::Error::Other))));

    // Cancellation failed but draining let the transfer finish normally
    assert!(session.backend().cancelled().is_empty());
    assert_eq!(session.backend().completion_log(), &[Ticket(0)]);
    assert_eq!(session.pending_count(), 0);
}

#[test]
fn test_event_failure_while_draining_releases_slot() {
    let mut backend = MockBackend::new();
    backend.hold_completions(true);
    backend.fail_cancel(true);
    backend.push_event_error(rusb::Error::Io);
    backend.push_event_error(rusb::Error::NoDevice);
    let mut session = BulkSession::new(backend, 1).unwrap();

    session.submit_read(6, None, 32, TIMEOUT).unwrap();
    let result = session.await_completion();
    assert!(matches!(result, Err(Error::AsyncEvent(rusb::Error::Io))));
    assert_eq!(session.pending_count(), 0);

    // The slot stays usable even though its transfer never came back
    session.backend_mut().hold_completions(false);
    session.backend_mut().fail_cancel(false);
    session.submit_write_buffer(2, vec![5; 2], TIMEOUT).unwrap();
    assert_eq!(session.capacity(), 1);

    // The abandoned read is still first in the mock's queue
    let report = session.await_completion().unwrap();
    assert_eq!(report.data(), &[5; 2]);
    assert_eq!(session.backend().completion_log(), &[Ticket(0), Ticket(1)]);

    // Its late outcome was discarded rather than left behind
    assert_eq!(session.backend().forgotten(), &[Ticket(0)]);
    assert_eq!(session.backend().unreclaimed(), 0);
}

#[test]
fn test_transfer_status_mapping_releases_slot() {
    let statuses = [
        (TransferStatus::Stall, "stall"),
        (TransferStatus::Overflow, "overflow"),
        (TransferStatus::NoDevice, "nodevice"),
        (TransferStatus::Error, "io"),
        (TransferStatus::Cancelled, "io"),
        (TransferStatus::Unknown(77), "other"),
    ];

    for (status, expected) in statuses {
        let mut backend = MockBackend::new();
        backend.set_status(0, status);
        let mut session = BulkSession::new(backend, 1).unwrap();

        session.submit_read(6, None, 8, TIMEOUT).unwrap();
        let err = session.await_completion().unwrap_err();
        let kind = match err {
            Error::Stall => "stall",
            Error::Overflow => "overflow",
            Error::NoDevice => "nodevice",
            Error::Io => "io",
            Error::Other(_) => "other",
            other => panic!("unexpected error for {:?}: {:?}", status, other),
        };
        assert_eq!(kind, expected, "status {:?}", status);
        assert_eq!(session.pending_count(), 0);
    }
}

#[test]
fn test_timed_out_transfer_reports_partial_length() {
    let mut backend = MockBackend::new();
    backend.set_status(0, TransferStatus::TimedOut);
    backend.set_actual_length(0, 12);
    let mut session = BulkSession::new(backend, 2).unwrap();

    session.submit_read(6, None, 512, TIMEOUT).unwrap();
    session.submit_write_buffer(2, vec![1], TIMEOUT).unwrap();

    assert!(matches!(
        session.await_completion(),
        Err(Error::TimedOut { transferred: 12 })
    ));
    // Not retried; the next request is reported normally
    assert_eq!(session.pending_count(), 1);
    assert_eq!(session.await_completion().unwrap().data(), &[1]);
    assert_eq!(session.backend().submissions().len(), 2);
}

#[test]
fn test_timed_out_read_keeps_partial_data() {
    let mut backend = MockBackend::new();
    backend.set_status(0, TransferStatus::TimedOut);
    backend.set_read_data(0, b"part".to_vec());
    let mut session = BulkSession::new(backend, 1).unwrap();

    session.submit_read(6, None, 64, TIMEOUT).unwrap();
    let report = session.await_report().unwrap();
    assert_eq!(report.status, TransferStatus::TimedOut);
    assert_eq!(report.requested_length, 64);
    assert_eq!(report.data(), b"part");
    assert!(matches!(
        report.result(),
        Err(Error::TimedOut { transferred: 4 })
    ));
    assert_eq!(session.pending_count(), 0);
}

// ============================================================================
// Drain and Configuration Tests
// ============================================================================

#[test]
fn test_drain_stops_on_event_failure() {
    let mut backend = MockBackend::new();
    backend.push_event_error(rusb::Error::Io);
    let mut session = BulkSession::new(backend, 4).unwrap();

    for _ in 0..3 {
        session.submit_read(6, None, 8, TIMEOUT).unwrap();
    }
    assert!(matches!(session.drain(), Err(Error::AsyncEvent(_))));
    assert_eq!(session.pending_count(), 2);
    assert_eq!(session.drain().unwrap(), 2);
}

#[test]
fn test_configured_event_wait_is_passed_to_backend() {
    let config = SessionConfig {
        event_wait_ms: Some(50),
        ..SessionConfig::default()
    };
    let mut session = BulkSession::with_config(MockBackend::new(), &config).unwrap();
    session.submit_read(6, None, 1, TIMEOUT).unwrap();
    session.await_completion().unwrap();

    assert_eq!(
        session.backend().last_event_wait(),
        Some(Some(Duration::from_millis(50)))
    );
}

#[test]
fn test_unbounded_event_wait_by_default() {
    let mut session = session(1);
    session.submit_read(6, None, 1, TIMEOUT).unwrap();
    session.await_completion().unwrap();
    assert_eq!(session.backend().last_event_wait(), Some(None));
}
