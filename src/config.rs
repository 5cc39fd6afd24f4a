//! Configuration for bookvault
//!
//! Centralized configuration with sensible defaults. Store-tuning knobs are
//! pass-through construction parameters: the node accepts and stores them,
//! the store consumes the ones that apply to its current file formats.

use std::path::PathBuf;

/// Main configuration for a bookvault node
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory for sstable data files
    pub data_dir: PathBuf,

    /// Directory for the entry log (write-ahead log)
    pub wal_dir: PathBuf,

    /// Group-commit durability: when true, a write is acknowledged only after
    /// the journal worker syncs the entry log. When false, writes are
    /// acknowledged as soon as the store insert succeeds and the journal
    /// worker is not started at all.
    pub fsync_journal: bool,

    /// Max size of the memtable before it is flushed to an sstable (bytes)
    pub memtable_size_limit: usize,

    /// Largest entry payload accepted on the write path (bytes)
    pub max_entry_size: usize,

    // -------------------------------------------------------------------------
    // Store Tuning (pass-through)
    // -------------------------------------------------------------------------
    /// Write buffer size for the entry log writer (bytes)
    pub write_buffer_size: usize,

    /// Block size used when laying out sstable data (bytes)
    pub block_size: usize,

    /// Block cache budget (bytes). Reserved for the read path.
    pub block_cache_size: usize,

    /// Bloom filter bits per key. Reserved for the read path.
    pub bloom_filter_bits: u32,

    /// Background flush concurrency
    pub flush_concurrency: usize,

    /// Background compaction concurrency
    pub compaction_concurrency: usize,

    // -------------------------------------------------------------------------
    // Journal Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the pending-write queue between producers and the journal
    /// worker. When full, producers block (backpressure, never drop).
    pub journal_queue_capacity: usize,

    /// Max entries drained into a single journal batch
    pub journal_batch_max: usize,

    /// Upper bound on physical durability syncs per second
    pub journal_sync_rate: f64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Host advertised in the coordination registration path
    pub advertised_host: String,

    /// Port advertised in the coordination registration path
    pub advertised_port: u16,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./bookvault_data"),
            wal_dir: PathBuf::from("./bookvault_data/wal"),
            fsync_journal: true,
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            max_entry_size: 5 * 1024 * 1024 - 64,
            write_buffer_size: 1024 * 1024,
            block_size: 64 * 1024,
            block_cache_size: 256 * 1024 * 1024,
            bloom_filter_bits: 10,
            flush_concurrency: 1,
            compaction_concurrency: 1,
            journal_queue_capacity: 10_000,
            journal_batch_max: 1_000,
            journal_sync_rate: 5_000.0,
            listen_addr: "0.0.0.0:3181".to_string(),
            advertised_host: "127.0.0.1".to_string(),
            advertised_port: 3181,
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Registration path derived from the advertised address
    pub fn registration_path(&self) -> String {
        format!(
            "/ledgers/available/{}:{}",
            self.advertised_host, self.advertised_port
        )
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the sstable data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the entry log directory
    pub fn wal_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wal_dir = path.into();
        self
    }

    /// Enable or disable group-commit fsync on the journal
    pub fn fsync_journal(mut self, enabled: bool) -> Self {
        self.config.fsync_journal = enabled;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the maximum accepted entry payload size (in bytes)
    pub fn max_entry_size(mut self, size: usize) -> Self {
        self.config.max_entry_size = size;
        self
    }

    /// Set the pending-write queue capacity
    pub fn journal_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.journal_queue_capacity = capacity;
        self
    }

    /// Set the max journal batch size
    pub fn journal_batch_max(mut self, max: usize) -> Self {
        self.config.journal_batch_max = max;
        self
    }

    /// Set the journal sync rate limit (syncs per second)
    pub fn journal_sync_rate(mut self, rate: f64) -> Self {
        self.config.journal_sync_rate = rate;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the advertised host and port used for registration
    pub fn advertised_addr(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.advertised_host = host.into();
        self.config.advertised_port = port;
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
