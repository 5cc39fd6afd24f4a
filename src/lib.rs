//! # bookvault
//!
//! A durable storage node ("bookie") for a replicated append-only log:
//! - Binary wire protocol decoded directly off the network
//! - Persistent ordered entry store with crash recovery
//! - Group-commit journal batching concurrent writes into rate-limited syncs
//! - Per-write completion handles: acknowledged only once durable
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │            (frame decoder → codec → handler)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ put(ledger, entry, payload)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                │
//! │          entry log append + memtable insert                 │
//! └───────┬──────────────────────────────────┬──────────────────┘
//!         │ completion handle                │ flush
//!         ▼                                  ▼
//! ┌───────────────┐                  ┌───────────────┐
//! │    Journal    │                  │   Sstables    │
//! │ (batch+fsync) │                  │  (immutable)  │
//! └───────┬───────┘                  └───────────────┘
//!         │ resolve after sync
//!         ▼
//!   WriteReceipt::wait() → response to client
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod store;
pub mod journal;
pub mod engine;
pub mod network;
pub mod registration;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::Engine;
pub use error::{Result, VaultError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of bookvault
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
