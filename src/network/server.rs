//! TCP Server
//!
//! Accepts connections and hands each one to its own handler thread.

use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

use super::Connection;

/// Poll interval of the non-blocking accept loop
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// TCP server for bookvault
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    shutdown: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server with the given config and engine
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            shutdown: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start the server (blocking until shutdown is signalled).
    ///
    /// The listener runs non-blocking so the shutdown flag is observed
    /// between accepts. Connections beyond the configured cap are closed
    /// immediately.
    pub fn run(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)?;
        listener.set_nonblocking(true)?;

        tracing::info!("listening on {}", self.config.listen_addr);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("shutdown requested, stopping accept loop");
                return Ok(());
            }

            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.active_connections.load(Ordering::Relaxed)
                        >= self.config.max_connections
                    {
                        tracing::warn!(
                            "connection limit reached ({}), dropping {}",
                            self.config.max_connections,
                            peer
                        );
                        drop(stream);
                        continue;
                    }

                    // The accepted stream inherits non-blocking mode on some
                    // platforms; the handler expects blocking reads
                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::warn!("failed to configure stream for {}: {}", peer, e);
                        continue;
                    }

                    self.spawn_handler(stream);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::error!("accept failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Signal the server to shut down after the current accept poll
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Shared shutdown flag, for signal handlers
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Number of currently active connections
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    fn spawn_handler(&self, stream: std::net::TcpStream) {
        let engine = Arc::clone(&self.engine);
        let active = Arc::clone(&self.active_connections);
        let read_timeout = self.config.read_timeout_ms;
        let write_timeout = self.config.write_timeout_ms;

        active.fetch_add(1, Ordering::Relaxed);

        std::thread::spawn(move || {
            let result = Connection::new(stream, engine).and_then(|mut conn| {
                conn.set_timeouts(read_timeout, write_timeout)?;
                conn.handle()
            });

            if let Err(e) = result {
                tracing::debug!("connection terminated: {}", e);
            }

            active.fetch_sub(1, Ordering::Relaxed);
        });
    }
}
