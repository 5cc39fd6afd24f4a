//! Store Manager
//!
//! Manages the sstable set and coordinates reads and memtable flushes.
//!
//! ## Responsibilities
//! - Discover existing sstables on startup
//! - Search sstables newest → oldest for lookups
//! - Create new sstables from memtable flushes
//!
//! ## Concurrency
//! - `sstables`: RwLock'd vec, newest first
//! - `next_sstable_id`: atomic counter, lock-free
//! - All methods take `&self`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{Result, VaultError};

use super::{EntryKey, MemTable, SstableBuilder, SstableMeta, SstableReader};

/// Manages the persistent sstable layer
pub struct StoreManager {
    /// Directory where sstables are stored
    data_dir: PathBuf,

    /// Open sstable readers, ordered newest → oldest
    sstables: RwLock<Vec<SstableReader>>,

    /// Next ID for creating new sstables
    next_sstable_id: AtomicU64,
}

impl StoreManager {
    /// Open or create storage in the given directory
    ///
    /// Discovers existing `sstable_NNNNNN.sst` files and opens a reader for
    /// each, newest first.
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    sstable_ids.push(id);
                }
            }
        }

        // Newest (highest ID) first
        sstable_ids.sort_unstable();
        sstable_ids.reverse();

        let mut sstables = Vec::new();
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            let reader = SstableReader::open(&sstable_path)?;
            sstables.push(reader);
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a payload by key, searching sstables newest → oldest.
    ///
    /// Uses the write lock because `SstableReader::get` seeks its file
    /// handle.
    pub fn get(&self, key: &EntryKey) -> Result<Option<Bytes>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }

            if let Some(payload) = reader.get(key)? {
                return Ok(Some(payload));
            }
        }

        Ok(None)
    }

    /// Flush a memtable to a new sstable
    ///
    /// Writes the memtable's sorted entries, opens a reader for the result,
    /// and inserts it at the front of the search order.
    pub fn flush(&self, memtable: &MemTable) -> Result<SstableMeta> {
        if memtable.is_empty() {
            return Err(VaultError::Storage(
                "cannot flush empty memtable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        // Snapshot is already sorted by key (BTreeMap order == byte order)
        let mut builder = SstableBuilder::new(&path)?;
        for (key, payload) in memtable.snapshot() {
            builder.add(key, &payload)?;
        }
        let metadata = builder.finish()?;

        let reader = SstableReader::open(&path)?;

        let mut sstables = self.sstables.write();
        sstables.insert(0, reader);

        tracing::debug!(
            "flushed memtable to {} ({} entries, {} bytes)",
            metadata.path.display(),
            metadata.entry_count,
            metadata.file_size
        );

        Ok(metadata)
    }

    /// Number of sstables currently open
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()?.to_str()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
