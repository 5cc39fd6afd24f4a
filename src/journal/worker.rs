//! Journal worker
//!
//! The dedicated thread implementing the drain → batch → sync → complete
//! loop. This is the only thread allowed to block on storage I/O; everything
//! else hands it work through the bounded pending-write queue.

use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::error::{Result, VaultError};

use super::{Completer, JournalEntry, RateLimiter};

/// Handle to the journal worker thread.
///
/// Producers call [`Journal::submit`] from any thread; the bounded queue
/// blocks them when full (backpressure, never drop). [`Journal::shutdown`]
/// enqueues the stop sentinel and joins the worker; it is idempotent.
pub struct Journal {
    tx: Sender<JournalEntry>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Journal {
    /// Spawn the worker thread.
    ///
    /// `sync_fn` performs the one physical durability sync per batch; it is
    /// injected so the engine can pass its entry-log sync and tests can
    /// count or gate syncs. A sync failure is fatal: acknowledging unsynced
    /// writes would break the durability contract, so the process aborts.
    pub fn spawn<F>(
        queue_capacity: usize,
        batch_max: usize,
        sync_rate: f64,
        sync_fn: F,
    ) -> Result<Self>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let (tx, rx) = bounded(queue_capacity);

        let handle = std::thread::Builder::new()
            .name("journal".to_string())
            .spawn(move || run(rx, batch_max, sync_rate, sync_fn))
            .map_err(VaultError::Io)?;

        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Enqueue one pending write.
    ///
    /// Blocks while the queue is full; fails only if the worker is gone.
    pub fn submit(&self, entry: JournalEntry) -> Result<()> {
        self.tx.send(entry).map_err(|_| VaultError::JournalStopped)
    }

    /// Stop the worker: enqueue the sentinel and join. Writes enqueued before
    /// the sentinel are synced and resolved first.
    pub fn shutdown(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            // Worker may already be gone if all senders dropped
            let _ = self.tx.send(JournalEntry::stop());
            if handle.join().is_err() {
                tracing::error!("journal thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The worker loop: block for one entry, drain up to the batch cap, one
/// rate-limited sync, resolve the batch FIFO, repeat.
fn run<F>(rx: Receiver<JournalEntry>, batch_max: usize, sync_rate: f64, mut sync_fn: F)
where
    F: FnMut() -> Result<()>,
{
    tracing::info!("journal worker started (batch_max={}, sync_rate={}/s)", batch_max, sync_rate);

    let mut limiter = RateLimiter::new(sync_rate);
    let mut batch: Vec<Completer> = Vec::with_capacity(batch_max);

    loop {
        // Block until at least one entry is available
        let first = match rx.recv() {
            Ok(entry) => entry,
            // All producers dropped without a sentinel; nothing left to sync
            Err(_) => return,
        };
        let oldest = first.enqueued_at;

        let mut stopping = false;
        match first.completer {
            Some(completer) => batch.push(completer),
            None => stopping = true,
        }

        // Drain without blocking, up to the batch cap or a sentinel
        while !stopping && batch.len() < batch_max {
            match rx.try_recv() {
                Ok(entry) => match entry.completer {
                    Some(completer) => batch.push(completer),
                    None => stopping = true,
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if !batch.is_empty() {
            limiter.acquire();

            // Exactly one physical sync covers every write in this batch
            if let Err(e) = sync_fn() {
                tracing::error!("journal sync failed: {} -- aborting", e);
                std::process::abort();
            }

            tracing::trace!(
                "journal batch synced: {} entries, oldest queued {:?} ago",
                batch.len(),
                oldest.elapsed()
            );

            // FIFO within the batch: resolve in enqueue order
            for completer in batch.drain(..) {
                completer.complete(Ok(()));
            }
        }

        if stopping {
            tracing::info!("journal worker stopping");
            return;
        }
    }
}
