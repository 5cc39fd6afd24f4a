//! Journal Tests
//!
//! Write-then-ack ordering, batching, backpressure, and shutdown behavior of
//! the group-commit worker, using injected sync hooks to count and gate the
//! physical syncs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;

use bookvault::journal::{completion, Journal, JournalEntry, RateLimiter, WriteReceipt};
use bookvault::VaultError;

// =============================================================================
// Completion Handle Tests
// =============================================================================

#[test]
fn test_completion_resolves_ok() {
    let (completer, receipt) = completion();
    completer.complete(Ok(()));
    assert!(receipt.wait().is_ok());
}

#[test]
fn test_completion_resolves_error() {
    let (completer, receipt) = completion();
    completer.complete(Err(VaultError::Storage("sync failed".into())));
    assert!(receipt.wait().is_err());
}

#[test]
fn test_completion_dropped_surfaces_as_stopped() {
    let (completer, receipt) = completion();
    drop(completer);

    match receipt.wait() {
        Err(VaultError::JournalStopped) => {}
        other => panic!("expected JournalStopped, got {:?}", other),
    }
}

#[test]
fn test_ready_receipt_is_pre_resolved() {
    let start = Instant::now();
    assert!(WriteReceipt::ready().wait().is_ok());
    assert!(start.elapsed() < Duration::from_millis(100));
}

// =============================================================================
// Write-then-ack Ordering Tests
// =============================================================================

#[test]
fn test_no_ack_before_covering_sync() {
    let sync_count = Arc::new(AtomicUsize::new(0));
    let (gate_tx, gate_rx) = channel::unbounded::<()>();

    let counter = Arc::clone(&sync_count);
    let journal = Journal::spawn(100, 16, 50_000.0, move || {
        // Hold the sync open until the test releases it
        let _ = gate_rx.recv();
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    let (completer, receipt) = completion();
    journal.submit(JournalEntry::pending(completer)).unwrap();

    let (done_tx, done_rx) = channel::unbounded();
    thread::spawn(move || {
        let _ = done_tx.send(receipt.wait());
    });

    // The write must not resolve while its sync is still in flight
    assert!(done_rx.recv_timeout(Duration::from_millis(150)).is_err());
    assert_eq!(sync_count.load(Ordering::SeqCst), 0);

    gate_tx.send(()).unwrap();
    let result = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("receipt never resolved");
    assert!(result.is_ok());
    assert_eq!(sync_count.load(Ordering::SeqCst), 1);

    gate_tx.send(()).unwrap(); // let any shutdown-batch sync through
    journal.shutdown();
}

#[test]
fn test_writes_batched_under_one_sync() {
    // Handshake gate: the hook announces each sync, then waits for a permit
    let (started_tx, started_rx) = channel::unbounded::<()>();
    let (permit_tx, permit_rx) = channel::unbounded::<()>();
    let sync_count = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&sync_count);
    let journal = Journal::spawn(200, 100, 50_000.0, move || {
        let _ = started_tx.send(());
        let _ = permit_rx.recv();
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    // First write enters its own sync and pins the worker there
    let (first_completer, first_receipt) = completion();
    journal.submit(JournalEntry::pending(first_completer)).unwrap();
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("first sync never started");

    // 50 more writes queue up behind the in-flight sync
    let mut receipts = Vec::new();
    for _ in 0..50 {
        let (completer, receipt) = completion();
        journal.submit(JournalEntry::pending(completer)).unwrap();
        receipts.push(receipt);
    }

    permit_tx.send(()).unwrap();
    assert!(first_receipt.wait().is_ok());

    // The backlog drains as a single batch under the second sync
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("second sync never started");
    permit_tx.send(()).unwrap();

    for receipt in receipts {
        assert!(receipt.wait().is_ok());
    }
    assert_eq!(sync_count.load(Ordering::SeqCst), 2);

    journal.shutdown();
}

// =============================================================================
// Backpressure Tests
// =============================================================================

#[test]
fn test_full_queue_blocks_submitter() {
    let (started_tx, started_rx) = channel::unbounded::<()>();
    let (permit_tx, permit_rx) = channel::unbounded::<()>();

    let journal = Arc::new(
        Journal::spawn(2, 16, 50_000.0, move || {
            let _ = started_tx.send(());
            let _ = permit_rx.recv();
            Ok(())
        })
        .unwrap(),
    );

    // Worker dequeues the first write and blocks in its sync
    let (c1, r1) = completion();
    journal.submit(JournalEntry::pending(c1)).unwrap();
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("sync never started");

    // Fill the queue to capacity behind it
    let (c2, r2) = completion();
    journal.submit(JournalEntry::pending(c2)).unwrap();
    let (c3, r3) = completion();
    journal.submit(JournalEntry::pending(c3)).unwrap();

    // One more submit must block, not drop or error
    let (submitted_tx, submitted_rx) = channel::unbounded();
    let journal_clone = Arc::clone(&journal);
    let (c4, r4) = completion();
    let submitter = thread::spawn(move || {
        journal_clone.submit(JournalEntry::pending(c4)).unwrap();
        let _ = submitted_tx.send(());
    });

    assert!(
        submitted_rx.recv_timeout(Duration::from_millis(150)).is_err(),
        "submit returned despite full queue"
    );

    // Release enough permits for every remaining batch
    for _ in 0..10 {
        permit_tx.send(()).unwrap();
    }

    submitted_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("blocked submit never completed");
    submitter.join().unwrap();

    for receipt in [r1, r2, r3, r4] {
        assert!(receipt.wait().is_ok());
    }

    journal.shutdown();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_resolves_prior_writes() {
    let sync_count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sync_count);

    let journal = Journal::spawn(100, 16, 50_000.0, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    let mut receipts = Vec::new();
    for _ in 0..3 {
        let (completer, receipt) = completion();
        journal.submit(JournalEntry::pending(completer)).unwrap();
        receipts.push(receipt);
    }

    journal.shutdown();

    // Everything enqueued before the sentinel is synced and acknowledged
    for receipt in receipts {
        assert!(receipt.wait().is_ok());
    }
    assert!(sync_count.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_shutdown_is_idempotent() {
    let journal = Journal::spawn(10, 4, 50_000.0, || Ok(())).unwrap();
    journal.shutdown();
    journal.shutdown();
}

// =============================================================================
// Rate Limiter Tests
// =============================================================================

#[test]
fn test_limiter_paces_sustained_acquires() {
    let mut limiter = RateLimiter::new(1000.0); // 1ms per permit

    let start = Instant::now();
    for _ in 0..21 {
        limiter.acquire();
    }

    // 21 back-to-back acquires need at least 20 fresh intervals
    assert!(
        start.elapsed() >= Duration::from_millis(15),
        "elapsed only {:?}",
        start.elapsed()
    );
}

#[test]
fn test_limiter_banks_permits_while_idle() {
    let mut limiter = RateLimiter::new(1000.0);
    limiter.acquire();

    thread::sleep(Duration::from_millis(80));

    // The idle window banked enough permits to absorb a burst
    let start = Instant::now();
    for _ in 0..50 {
        limiter.acquire();
    }
    assert!(
        start.elapsed() < Duration::from_millis(40),
        "burst throttled: {:?}",
        start.elapsed()
    );
}

#[test]
fn test_limiter_fresh_permits_accrue_debt() {
    let mut limiter = RateLimiter::new(500.0); // 2ms per fresh permit
    limiter.acquire();

    thread::sleep(Duration::from_millis(50)); // banks ~25 permits

    let start = Instant::now();
    limiter.acquire_many(100); // 25 stored, ~75 fresh
    // The next acquire pays the debt left by the fresh permits
    limiter.acquire();
    assert!(start.elapsed() >= Duration::from_millis(100));
}
