//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency. Entries are
//! immutable and never deleted, so there are no tombstones; an insert for an
//! existing key simply rewrites the same payload.

use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use super::EntryKey;

/// In-memory table for recent writes
///
/// - Reads take the read lock (many concurrent readers)
/// - Writes take the write lock (brief, per insert)
/// - Size/count are atomics so flush checks stay lock-free
pub struct MemTable {
    data: RwLock<std::collections::BTreeMap<EntryKey, Bytes>>,
    size: AtomicUsize,
    entry_count: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(std::collections::BTreeMap::new()),
            size: AtomicUsize::new(0),
            entry_count: AtomicUsize::new(0),
        }
    }

    /// Get a payload by key (read lock)
    pub fn get(&self, key: &EntryKey) -> Option<Bytes> {
        self.data.read().get(key).cloned()
    }

    /// Insert an entry (write lock). Returns the new approximate size.
    ///
    /// The entry is visible to readers as soon as this returns, before any
    /// durability sync.
    pub fn insert(&self, key: EntryKey, payload: Bytes) -> usize {
        let entry_bytes = super::KEY_SIZE + payload.len();

        let mut data = self.data.write();
        if let Some(prev) = data.insert(key, payload) {
            // Rewrite of the same key: keep the count, adjust the size
            self.size
                .fetch_sub(super::KEY_SIZE + prev.len(), Ordering::Relaxed);
        } else {
            self.entry_count.fetch_add(1, Ordering::Relaxed);
        }
        self.size.fetch_add(entry_bytes, Ordering::Relaxed) + entry_bytes
    }

    /// Approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Number of entries
    pub fn entry_count(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Snapshot all entries in sorted key order (for sstable flush)
    pub fn snapshot(&self) -> Vec<(EntryKey, Bytes)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    /// Clear all entries (after a successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::Relaxed);
        self.entry_count.store(0, Ordering::Relaxed);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
