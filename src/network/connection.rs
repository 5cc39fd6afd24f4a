//! Connection Handler
//!
//! Owns one connection's protocol-level behavior: read frames, decode,
//! dispatch by opcode, write one response per request.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::Engine;
use crate::error::{Result, VaultError};
use crate::protocol::{
    decode_request, encode_response, read_frame, write_frame, ErrorCode, OpCode, Request,
    Response,
};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and disables Nagle's algorithm.
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            peer_addr,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed).
    ///
    /// Framing and protocol-level decode errors are connection-fatal: a
    /// garbled frame desynchronizes every request behind it, so the
    /// connection is closed without a response.
    pub fn handle(&mut self) -> Result<()> {
        tracing::info!("new connection from {}", self.peer_addr);

        loop {
            let frame = match read_frame(&mut self.reader) {
                Ok(frame) => frame,
                Err(VaultError::Io(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    tracing::info!("closed connection from {}", self.peer_addr);
                    return Ok(());
                }
                Err(VaultError::Io(ref e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::ConnectionReset
                            | std::io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("connection reset by {}", self.peer_addr);
                    return Ok(());
                }
                Err(VaultError::Io(ref e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    tracing::debug!("read timeout for {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("bad frame from {}: {} -- closing", self.peer_addr, e);
                    return Err(e);
                }
            };

            let request = match decode_request(frame) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("bad request from {}: {} -- closing", self.peer_addr, e);
                    return Err(e);
                }
            };

            tracing::trace!("request from {}: {:?}", self.peer_addr, request.op);

            match request.op {
                OpCode::AddEntry => self.handle_add_entry(request)?,
                OpCode::ReadEntry => self.handle_read_entry(request)?,
                OpCode::Auth => {
                    // Accepted for protocol compatibility, not acted upon
                    tracing::debug!("ignoring auth message from {}", self.peer_addr);
                }
            }
        }
    }

    /// AddEntry: write through the engine, wait for durability, respond.
    ///
    /// A storage failure is reported as an IOError response and the
    /// connection stays open; retry policy belongs to the caller.
    fn handle_add_entry(&mut self, request: Request) -> Result<()> {
        // Captured before put() takes ownership of the payload
        let ledger_id = request.ledger_id;
        let entry_id = request.entry_id;
        let entry_len = request.payload.len();

        let start = Instant::now();

        let error = match self.engine.put(ledger_id, entry_id, request.payload) {
            Ok(receipt) => match receipt.wait() {
                Ok(()) => {
                    tracing::debug!(
                        "entry persisted at {}:{} -- size: {} -- {:?}",
                        ledger_id,
                        entry_id,
                        entry_len,
                        start.elapsed()
                    );
                    ErrorCode::Ok
                }
                Err(e) => {
                    tracing::warn!("entry {}:{} not persisted: {}", ledger_id, entry_id, e);
                    ErrorCode::IoError
                }
            },
            Err(e) => {
                tracing::warn!("add entry {}:{} rejected: {}", ledger_id, entry_id, e);
                ErrorCode::IoError
            }
        };

        self.send(Response::new(OpCode::AddEntry, error, ledger_id, entry_id))
    }

    /// ReadEntry: the read path is not implemented yet; answer with a
    /// defined NoEntry-class response instead of dropping the request.
    fn handle_read_entry(&mut self, request: Request) -> Result<()> {
        tracing::debug!(
            "read entry {}:{} (fencing={}) -- read path not supported",
            request.ledger_id,
            request.entry_id,
            request.is_fencing()
        );

        self.send(Response::new(
            OpCode::ReadEntry,
            ErrorCode::NoEntry,
            request.ledger_id,
            request.entry_id,
        ))
    }

    /// Write one response frame, degrading client-side disconnects to Ok
    fn send(&mut self, response: Response) -> Result<()> {
        match write_frame(&mut self.writer, &encode_response(&response)) {
            Ok(()) => Ok(()),
            Err(VaultError::Io(ref e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::BrokenPipe
                ) =>
            {
                tracing::debug!(
                    "client {} disconnected before response could be sent",
                    self.peer_addr
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("error writing to {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
