//! Store Module
//!
//! Persistent ordered key-value layer mapping a 16-byte (ledger, entry) key
//! to an opaque entry payload.
//!
//! ## Responsibilities
//! - Encode entry keys so byte order matches (ledger, entry) order
//! - Append every accepted write to the entry log (the journal's sync target)
//! - Keep recent writes readable in the memtable
//! - Flush the memtable into immutable sstables
//! - Replay the entry log on startup
//!
//! The write path only needs point inserts, but the key ordering invariant is
//! preserved everywhere (memtable, sstable layout) so the future read path
//! can range-scan a ledger.

mod log;
mod memtable;
mod manager;
mod sstable;

pub use log::{replay, EntryLog, ReplayStats};
pub use manager::StoreManager;
pub use memtable::MemTable;
pub use sstable::{SstableBuilder, SstableMeta, SstableReader};

/// Size of an encoded entry key in bytes
pub const KEY_SIZE: usize = 16;

/// Key of one entry: (ledgerId, entryId), both 64-bit signed.
///
/// Ordering compares the ids as unsigned values, which is exactly the
/// byte-wise order of the big-endian encoding. For non-negative ids this
/// equals numeric (ledger, entry) lexicographic order — the invariant range
/// scans rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub ledger_id: i64,
    pub entry_id: i64,
}

impl EntryKey {
    pub fn new(ledger_id: i64, entry_id: i64) -> Self {
        Self { ledger_id, entry_id }
    }

    /// Serialize to 16 bytes, big-endian, ledger first
    pub fn encode(&self) -> [u8; KEY_SIZE] {
        let mut buf = [0u8; KEY_SIZE];
        buf[..8].copy_from_slice(&self.ledger_id.to_be_bytes());
        buf[8..].copy_from_slice(&self.entry_id.to_be_bytes());
        buf
    }

    /// Deserialize from the 16-byte encoded form
    pub fn decode(buf: &[u8; KEY_SIZE]) -> Self {
        Self {
            ledger_id: i64::from_be_bytes(buf[..8].try_into().unwrap()),
            entry_id: i64::from_be_bytes(buf[8..].try_into().unwrap()),
        }
    }
}

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Unsigned comparison == byte-wise comparison of the BE encoding
        (self.ledger_id as u64, self.entry_id as u64)
            .cmp(&(other.ledger_id as u64, other.entry_id as u64))
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ledger_id, self.entry_id)
    }
}
