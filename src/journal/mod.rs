//! Journal Module
//!
//! The group-commit durability mechanism: a single dedicated worker thread
//! drains pending writes from a bounded queue, performs one rate-limited
//! physical sync per batch, and resolves every completion handle covered by
//! that sync.
//!
//! ## Write-to-ack flow
//! ```text
//! put() ──► entry log append + memtable insert
//!   │
//!   ├─► JournalEntry{Completer} ──► bounded queue ──► journal thread
//!   │                                                   │ drain ≤ batch cap
//!   └─► WriteReceipt::wait() ◄── complete(Ok) ◄── one sync per batch
//! ```
//!
//! A completion handle resolves Ok if and only if a physical sync covering
//! its write has completed.

mod limiter;
mod worker;

use std::time::Instant;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::error::{Result, VaultError};

pub use limiter::RateLimiter;
pub use worker::Journal;

// =============================================================================
// Completion handles
// =============================================================================

/// Create a linked completer/receipt pair.
///
/// The completer side is consumed exactly once by the journal worker; the
/// receipt side is held by the caller awaiting durability.
pub fn completion() -> (Completer, WriteReceipt) {
    let (tx, rx) = bounded(1);
    (Completer { tx }, WriteReceipt { rx })
}

/// Single-resolution producer half of a write completion
pub struct Completer {
    tx: Sender<Result<()>>,
}

impl Completer {
    /// Resolve the paired receipt. Consumes self: a completer resolves once.
    pub fn complete(self, result: Result<()>) {
        // The receipt may already be dropped; nothing to do then
        let _ = self.tx.send(result);
    }
}

/// Consumer half of a write completion
pub struct WriteReceipt {
    rx: Receiver<Result<()>>,
}

impl WriteReceipt {
    /// Block until the write is resolved.
    ///
    /// A completer dropped without resolving (journal torn down mid-write)
    /// surfaces as [`VaultError::JournalStopped`].
    pub fn wait(self) -> Result<()> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(VaultError::JournalStopped),
        }
    }

    /// A receipt that is already resolved Ok.
    ///
    /// Used in no-fsync mode, where a write is acknowledged as soon as the
    /// store insert succeeds and the journal is bypassed entirely.
    pub fn ready() -> Self {
        let (completer, receipt) = completion();
        completer.complete(Ok(()));
        receipt
    }
}

// =============================================================================
// Journal entries
// =============================================================================

/// One pending write handed to the journal worker.
///
/// Created only after the store insert succeeded; consumed exactly once.
pub struct JournalEntry {
    /// Completion handle for the pending write; `None` is the stop sentinel
    pub(crate) completer: Option<Completer>,

    /// When the entry was enqueued (queue-wait observability)
    pub(crate) enqueued_at: Instant,
}

impl JournalEntry {
    /// An entry awaiting the next batch sync
    pub fn pending(completer: Completer) -> Self {
        Self {
            completer: Some(completer),
            enqueued_at: Instant::now(),
        }
    }

    /// The shutdown sentinel: the worker syncs and resolves everything
    /// drained before it, then exits
    pub fn stop() -> Self {
        Self {
            completer: None,
            enqueued_at: Instant::now(),
        }
    }
}
