//! Server Tests
//!
//! End-to-end TCP tests exercising the accept loop, connection handler, and
//! wire protocol against a real engine.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tempfile::TempDir;

use bookvault::network::Server;
use bookvault::protocol::{
    decode_response, encode_request, read_frame, write_frame, ErrorCode, OpCode, Request,
};
use bookvault::store::EntryKey;
use bookvault::{Config, Engine};

// =============================================================================
// Test Harness
// =============================================================================

/// Find a port the OS considers free right now
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn test_config(dir: &TempDir, port: u16) -> Config {
    Config::builder()
        .data_dir(dir.path().join("data"))
        .wal_dir(dir.path().join("wal"))
        .listen_addr(format!("127.0.0.1:{}", port))
        .journal_sync_rate(50_000.0)
        .build()
}

struct TestServer {
    engine: Arc<Engine>,
    addr: String,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(dir: &TempDir) -> Self {
        let port = free_port();
        let config = test_config(dir, port);
        let addr = config.listen_addr.clone();

        let engine = Arc::new(Engine::open(config.clone()).unwrap());
        let mut server = Server::new(config, Arc::clone(&engine));
        let shutdown = server.shutdown_flag();

        let handle = std::thread::spawn(move || {
            server.run().unwrap();
        });

        Self {
            engine,
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Connect, retrying until the accept loop is up
    fn connect(&self) -> TcpStream {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match TcpStream::connect(&self.addr) {
                Ok(stream) => return stream,
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => panic!("server never came up: {}", e),
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let _ = self.engine.close();
    }
}

/// True when the peer closed the connection (read returns 0 bytes)
fn reads_eof(stream: &mut TcpStream) -> bool {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut buf = [0u8; 1];
    matches!(stream.read(&mut buf), Ok(0))
}

// =============================================================================
// AddEntry End-to-End Tests
// =============================================================================

#[test]
fn test_add_entry_end_to_end() {
    let dir = TempDir::new().unwrap();
    let server = TestServer::start(&dir);
    let mut stream = server.connect();

    let request = Request::add_entry(7, 0, Bytes::from_static(b"hello"));
    write_frame(&mut stream, &encode_request(&request)).unwrap();

    let response = decode_response(read_frame(&mut stream).unwrap()).unwrap();
    assert_eq!(response.op, OpCode::AddEntry);
    assert_eq!(response.error, ErrorCode::Ok);
    assert_eq!(response.ledger_id, 7);
    assert_eq!(response.entry_id, 0);

    // Acknowledged means readable through the engine
    assert_eq!(
        server.engine.lookup(&EntryKey::new(7, 0)).unwrap().unwrap(),
        &b"hello"[..]
    );
}

#[test]
fn test_pipelined_requests_one_connection() {
    let dir = TempDir::new().unwrap();
    let server = TestServer::start(&dir);
    let mut stream = server.connect();

    for entry_id in 0..5 {
        let payload = Bytes::from(format!("entry-{}", entry_id));
        let request = Request::add_entry(9, entry_id, payload);
        write_frame(&mut stream, &encode_request(&request)).unwrap();
    }

    // One in-order response per request
    for entry_id in 0..5 {
        let response = decode_response(read_frame(&mut stream).unwrap()).unwrap();
        assert_eq!(response.error, ErrorCode::Ok);
        assert_eq!(response.entry_id, entry_id);
    }
}

#[test]
fn test_concurrent_connections() {
    let dir = TempDir::new().unwrap();
    let server = Arc::new(TestServer::start(&dir));

    let mut handles = Vec::new();
    for ledger_id in 0..4i64 {
        let server = Arc::clone(&server);
        handles.push(std::thread::spawn(move || {
            let mut stream = server.connect();
            let request =
                Request::add_entry(ledger_id, 0, Bytes::from_static(b"concurrent"));
            write_frame(&mut stream, &encode_request(&request)).unwrap();

            let response = decode_response(read_frame(&mut stream).unwrap()).unwrap();
            assert_eq!(response.error, ErrorCode::Ok);
            assert_eq!(response.ledger_id, ledger_id);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for ledger_id in 0..4 {
        assert!(server
            .engine
            .lookup(&EntryKey::new(ledger_id, 0))
            .unwrap()
            .is_some());
    }
}

// =============================================================================
// ReadEntry and Auth Tests
// =============================================================================

#[test]
fn test_read_entry_answers_no_entry() {
    let dir = TempDir::new().unwrap();
    let server = TestServer::start(&dir);
    let mut stream = server.connect();

    // Even a stored entry is not servable over the wire yet
    let add = Request::add_entry(3, 0, Bytes::from_static(b"stored"));
    write_frame(&mut stream, &encode_request(&add)).unwrap();
    let _ = decode_response(read_frame(&mut stream).unwrap()).unwrap();

    let read = Request::read_entry(3, 0, 0);
    write_frame(&mut stream, &encode_request(&read)).unwrap();

    let response = decode_response(read_frame(&mut stream).unwrap()).unwrap();
    assert_eq!(response.op, OpCode::ReadEntry);
    assert_eq!(response.error, ErrorCode::NoEntry);
    assert!(response.payload.is_empty());
}

#[test]
fn test_auth_is_accepted_without_response() {
    let dir = TempDir::new().unwrap();
    let server = TestServer::start(&dir);
    let mut stream = server.connect();

    // Auth frame: header (version 2, op 3), then an opaque blob
    let mut auth_frame = vec![0x02, 0x03, 0x00, 0x00];
    auth_frame.extend_from_slice(b"opaque auth blob");
    write_frame(&mut stream, &auth_frame).unwrap();

    // The connection must remain usable for the next request
    let request = Request::add_entry(1, 0, Bytes::from_static(b"after auth"));
    write_frame(&mut stream, &encode_request(&request)).unwrap();

    let response = decode_response(read_frame(&mut stream).unwrap()).unwrap();
    assert_eq!(response.op, OpCode::AddEntry);
    assert_eq!(response.error, ErrorCode::Ok);
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[test]
fn test_undersized_request_closes_connection() {
    let dir = TempDir::new().unwrap();
    let server = TestServer::start(&dir);
    let mut stream = server.connect();

    // Well-formed frame carrying a truncated add-entry body
    let mut body = vec![0x02, 0x01, 0x00, 0x00];
    body.extend_from_slice(&[0u8; 10]);
    write_frame(&mut stream, &body).unwrap();

    // No response bytes: the server closes without answering
    assert!(reads_eof(&mut stream));
}

#[test]
fn test_unknown_opcode_closes_connection() {
    let dir = TempDir::new().unwrap();
    let server = TestServer::start(&dir);
    let mut stream = server.connect();

    write_frame(&mut stream, &[0x02, 0x63, 0x00, 0x00]).unwrap();
    assert!(reads_eof(&mut stream));
}

#[test]
fn test_oversized_frame_length_closes_connection() {
    let dir = TempDir::new().unwrap();
    let server = TestServer::start(&dir);
    let mut stream = server.connect();

    use std::io::Write;
    // Claimed length beyond the frame cap; the server refuses to read it
    stream.write_all(&(6 * 1024 * 1024u32).to_be_bytes()).unwrap();
    stream.write_all(&[0u8; 64]).unwrap();
    stream.flush().unwrap();

    assert!(reads_eof(&mut stream));
}
