//! Engine Tests
//!
//! End-to-end write path behavior: durable puts, crash recovery through the
//! entry log, memtable flushes, and the unimplemented-read contract.

use bytes::Bytes;
use tempfile::TempDir;

use bookvault::store::EntryKey;
use bookvault::{Config, Engine, VaultError};

fn test_config(dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(dir.path().join("data"))
        .wal_dir(dir.path().join("wal"))
        .journal_sync_rate(50_000.0)
        .build()
}

// =============================================================================
// Write Path Tests
// =============================================================================

#[test]
fn test_put_then_lookup() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(test_config(&dir)).unwrap();

    let r1 = engine.put(7, 0, Bytes::from_static(b"hello")).unwrap();
    let r2 = engine.put(7, 1, Bytes::from_static(b"world")).unwrap();
    r1.wait().unwrap();
    r2.wait().unwrap();

    assert_eq!(
        engine.lookup(&EntryKey::new(7, 0)).unwrap().unwrap(),
        &b"hello"[..]
    );
    assert_eq!(
        engine.lookup(&EntryKey::new(7, 1)).unwrap().unwrap(),
        &b"world"[..]
    );
    assert!(engine.lookup(&EntryKey::new(7, 2)).unwrap().is_none());

    engine.close().unwrap();
}

#[test]
fn test_put_visible_before_receipt_resolved() {
    // Reads go through the memtable, which is updated before the journal
    // sync, so a lookup can race ahead of the durability ack
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(test_config(&dir)).unwrap();

    let receipt = engine.put(1, 0, Bytes::from_static(b"racy")).unwrap();
    assert_eq!(
        engine.lookup(&EntryKey::new(1, 0)).unwrap().unwrap(),
        &b"racy"[..]
    );

    receipt.wait().unwrap();
    engine.close().unwrap();
}

#[test]
fn test_put_negative_ids() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(test_config(&dir)).unwrap();

    engine.put(-1, -1, Bytes::from_static(b"sentinel ids")).unwrap().wait().unwrap();
    assert_eq!(
        engine.lookup(&EntryKey::new(-1, -1)).unwrap().unwrap(),
        &b"sentinel ids"[..]
    );

    engine.close().unwrap();
}

#[test]
fn test_oversized_put_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path().join("data"))
        .wal_dir(dir.path().join("wal"))
        .max_entry_size(100)
        .journal_sync_rate(50_000.0)
        .build();
    let engine = Engine::open(config).unwrap();

    let oversized = Bytes::from(vec![0u8; 101]);
    match engine.put(5, 0, oversized) {
        Err(VaultError::EntryTooLarge { size, max }) => {
            assert_eq!(size, 101);
            assert_eq!(max, 100);
        }
        other => panic!("expected EntryTooLarge, got {:?}", other.map(|_| ())),
    }

    // The failed write left no trace, and later writes are unaffected
    assert_eq!(engine.memtable_entry_count(), 0);
    engine.put(5, 1, Bytes::from_static(b"small")).unwrap().wait().unwrap();
    assert_eq!(
        engine.lookup(&EntryKey::new(5, 1)).unwrap().unwrap(),
        &b"small"[..]
    );

    engine.close().unwrap();
}

#[test]
fn test_no_fsync_mode_acks_immediately() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path().join("data"))
        .wal_dir(dir.path().join("wal"))
        .fsync_journal(false)
        .build();
    let engine = Engine::open(config).unwrap();

    engine.put(2, 0, Bytes::from_static(b"fast")).unwrap().wait().unwrap();
    assert_eq!(
        engine.lookup(&EntryKey::new(2, 0)).unwrap().unwrap(),
        &b"fast"[..]
    );

    engine.close().unwrap();
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_memtable_flush_on_size_limit() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path().join("data"))
        .wal_dir(dir.path().join("wal"))
        .memtable_size_limit(256)
        .journal_sync_rate(50_000.0)
        .build();
    let engine = Engine::open(config).unwrap();

    let mut receipts = Vec::new();
    for entry_id in 0..10 {
        let payload = Bytes::from(vec![b'x'; 64]);
        receipts.push(engine.put(1, entry_id, payload).unwrap());
    }
    for receipt in receipts {
        receipt.wait().unwrap();
    }

    // The size limit forced at least one flush, and nothing was lost
    assert!(engine.sstable_count() >= 1);
    for entry_id in 0..10 {
        assert!(engine.lookup(&EntryKey::new(1, entry_id)).unwrap().is_some());
    }

    engine.close().unwrap();
}

#[test]
fn test_explicit_flush_clears_memtable() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(test_config(&dir)).unwrap();

    engine.put(4, 0, Bytes::from_static(b"flushed")).unwrap().wait().unwrap();
    assert_eq!(engine.memtable_entry_count(), 1);

    engine.flush().unwrap();
    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.sstable_count(), 1);

    // Still readable through the sstable layer
    assert_eq!(
        engine.lookup(&EntryKey::new(4, 0)).unwrap().unwrap(),
        &b"flushed"[..]
    );

    engine.close().unwrap();
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_reopen_after_close_preserves_entries() {
    let dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(test_config(&dir)).unwrap();
        engine.put(7, 0, Bytes::from_static(b"hello")).unwrap().wait().unwrap();
        engine.put(7, 1, Bytes::from_static(b"world")).unwrap().wait().unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(test_config(&dir)).unwrap();
    assert_eq!(
        engine.lookup(&EntryKey::new(7, 0)).unwrap().unwrap(),
        &b"hello"[..]
    );
    assert_eq!(
        engine.lookup(&EntryKey::new(7, 1)).unwrap().unwrap(),
        &b"world"[..]
    );
    engine.close().unwrap();
}

#[test]
fn test_reopen_without_close_replays_entry_log() {
    let dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(test_config(&dir)).unwrap();
        engine.put(3, 0, Bytes::from_static(b"durable")).unwrap().wait().unwrap();
        // Dropped without close(): the synced entry log is all that remains
    }

    let engine = Engine::open(test_config(&dir)).unwrap();
    assert_eq!(
        engine.lookup(&EntryKey::new(3, 0)).unwrap().unwrap(),
        &b"durable"[..]
    );
    // Recovery lands the replayed entries in an sstable, not the memtable
    assert_eq!(engine.memtable_entry_count(), 0);
    assert!(engine.sstable_count() >= 1);
    engine.close().unwrap();
}

// =============================================================================
// Read Path Contract Tests
// =============================================================================

#[test]
fn test_read_entry_fails_fast() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(test_config(&dir)).unwrap();

    engine.put(1, 0, Bytes::from_static(b"stored")).unwrap().wait().unwrap();

    match engine.read_entry(1, 0) {
        Err(VaultError::Unsupported(_)) => {}
        other => panic!("expected Unsupported, got {:?}", other),
    }
    match engine.get_last_entry(1) {
        Err(VaultError::Unsupported(_)) => {}
        other => panic!("expected Unsupported, got {:?}", other),
    }

    engine.close().unwrap();
}
