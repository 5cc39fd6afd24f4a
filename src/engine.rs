//! Engine Module
//!
//! The storage engine facade that coordinates the entry log, memtable,
//! sstables, and the group-commit journal.
//!
//! ## Write path
//! 1. Append to the entry log and insert into the memtable (read-visible
//!    immediately, before any durability sync)
//! 2. Only if that succeeded, enqueue a completion handle on the journal
//! 3. The caller's receipt resolves when the journal's next batch sync
//!    covers the write
//!
//! In no-fsync mode step 2 is skipped, the receipt is pre-resolved, and the
//! journal worker is never started.
//!
//! ## Concurrency Model
//! - Writes from any number of connection threads; the log append + memtable
//!   insert pair is serialized by `write_lock` so log order matches memtable
//!   content at flush time
//! - The journal thread is the only thread that blocks on storage I/O
//! - The memtable's own RwLock serves concurrent readers

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::journal::{completion, Journal, JournalEntry, WriteReceipt};
use crate::store::{self, EntryKey, EntryLog, MemTable, StoreManager};

/// The main storage engine
pub struct Engine {
    config: Config,

    /// Entry log: every accepted write lands here; shared with the journal
    /// thread, which syncs it
    wal: Arc<Mutex<EntryLog>>,

    /// Recent writes, readable before durability
    memtable: MemTable,

    /// Persistent sstable layer
    store: StoreManager,

    /// Group-commit worker; `None` in no-fsync mode
    journal: Option<Journal>,

    /// Serializes the append+insert pair and memtable flushes
    write_lock: Mutex<()>,
}

impl Engine {
    const LOG_FILENAME: &'static str = "entries.log";

    /// Open or create an engine with the given config.
    ///
    /// Startup replays the entry log into the memtable, flushes anything
    /// recovered to a durable sstable, truncates the log, and (in fsync mode)
    /// starts the journal worker.
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        fs::create_dir_all(&config.wal_dir)?;

        let log_path = Self::log_path(&config);
        let store = StoreManager::open(&config.data_dir)?;
        let memtable = MemTable::new();

        if log_path.exists() {
            let (entries, stats) = store::replay(&log_path)?;

            if stats.records_recovered > 0 || stats.tail_truncated {
                tracing::info!(
                    "entry log recovery: {} records recovered, tail_truncated={}",
                    stats.records_recovered,
                    stats.tail_truncated
                );
            }

            for (key, payload) in entries {
                memtable.insert(key, payload);
            }

            // Flush recovered entries immediately: once they sit in a synced
            // sstable the log can be truncated safely
            if !memtable.is_empty() {
                store.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut log = EntryLog::open(&log_path, config.write_buffer_size)?;
        log.truncate()?;
        let wal = Arc::new(Mutex::new(log));

        let journal = if config.fsync_journal {
            let sync_target = Arc::clone(&wal);
            Some(Journal::spawn(
                config.journal_queue_capacity,
                config.journal_batch_max,
                config.journal_sync_rate,
                move || sync_target.lock().sync(),
            )?)
        } else {
            tracing::warn!("fsync_journal disabled: writes are acknowledged before durability");
            None
        };

        tracing::info!(
            "engine opened (data={}, wal={}, fsync_journal={})",
            config.data_dir.display(),
            config.wal_dir.display(),
            config.fsync_journal
        );

        Ok(Self {
            config,
            wal,
            memtable,
            store,
            journal,
            write_lock: Mutex::new(()),
        })
    }

    /// Durably store one entry.
    ///
    /// Returns a receipt that resolves once a journal sync covers the write
    /// (immediately in no-fsync mode). If the store insert itself fails, the
    /// error is returned here and nothing is enqueued — the journal never
    /// accounts for writes that were not applied.
    pub fn put(&self, ledger_id: i64, entry_id: i64, payload: Bytes) -> Result<WriteReceipt> {
        if payload.len() > self.config.max_entry_size {
            return Err(VaultError::EntryTooLarge {
                size: payload.len(),
                max: self.config.max_entry_size,
            });
        }

        let key = EntryKey::new(ledger_id, entry_id);

        {
            let _write_guard = self.write_lock.lock();

            self.wal.lock().append(&key, &payload)?;
            let new_size = self.memtable.insert(key, payload);

            if new_size >= self.config.memtable_size_limit {
                self.flush_internal()?;
            }
        }

        match &self.journal {
            Some(journal) => {
                let (completer, receipt) = completion();
                journal.submit(JournalEntry::pending(completer))?;
                Ok(receipt)
            }
            None => Ok(WriteReceipt::ready()),
        }
    }

    /// Read one entry. Not implemented yet: fails fast rather than hanging.
    pub fn read_entry(&self, _ledger_id: i64, _entry_id: i64) -> Result<Bytes> {
        Err(VaultError::Unsupported("read path (ReadEntry)"))
    }

    /// Read the last entry of a ledger. Not implemented yet; fails fast.
    pub fn get_last_entry(&self, _ledger_id: i64) -> Result<Bytes> {
        Err(VaultError::Unsupported("last-entry read"))
    }

    /// Direct key-value lookup: memtable first, then sstables newest → oldest
    pub fn lookup(&self, key: &EntryKey) -> Result<Option<Bytes>> {
        if let Some(payload) = self.memtable.get(key) {
            return Ok(Some(payload));
        }
        self.store.get(key)
    }

    /// Force a memtable flush regardless of size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Flush the memtable to an sstable and truncate the entry log.
    ///
    /// Called with `write_lock` held. Pending journal receipts covering the
    /// flushed entries stay valid: the sstable is synced on finish, so the
    /// next journal sync (now over an empty log) resolves them correctly.
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.store.flush(&self.memtable)?;
        self.memtable.clear();
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Close the engine: flush remaining entries, stop the journal after it
    /// resolved every pending write, and sync the log a final time.
    pub fn close(&self) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.shutdown();
        }

        {
            let _write_guard = self.write_lock.lock();
            if !self.memtable.is_empty() {
                self.flush_internal()?;
            }
        }

        self.wal.lock().sync()?;
        tracing::info!("engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Current memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Number of sstables
    pub fn sstable_count(&self) -> usize {
        self.store.sstable_count()
    }

    /// The configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn log_path(config: &Config) -> PathBuf {
        config.wal_dir.join(Self::LOG_FILENAME)
    }
}
