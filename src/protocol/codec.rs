//! Protocol codec
//!
//! Encoding and decoding between length-defined frames and typed
//! [`Request`]/[`Response`] values, in both the server direction
//! (decode request / encode response) and the client direction
//! (encode request / decode response).
//!
//! ## Frame layout
//!
//! Every frame starts with a packed 4-byte header:
//!
//! ```text
//! ┌────────────┬────────────┬──────────────┐
//! │ version(8) │ opcode(8)  │   flags(16)  │
//! └────────────┴────────────┴──────────────┘
//! ```
//!
//! ### AddEntry request body
//! ```text
//! ┌────────────────┬────────────┬───────────┬───────────────┐
//! │ master key(20) │ ledger(8)  │ entry(8)  │ entry payload │
//! └────────────────┴────────────┴───────────┴───────────────┘
//! ```
//!
//! ### AddEntry / ReadEntry response body
//! ```text
//! ┌───────────┬────────────┬───────────┬──────────────────────┐
//! │ error(4)  │ ledger(8)  │ entry(8)  │ payload (read, EOK)  │
//! └───────────┴────────────┴───────────┴──────────────────────┘
//! ```
//!
//! A successful read carries the entry payload as the frame remainder after
//! the 20-byte triple; its length is implied by the outer frame length.
//!
//! Any frame shorter than its minimum size desynchronizes the stream, so the
//! caller must close the connection on decode failure rather than respond.

use std::io::{Read, Write};

use bytes::Bytes;

use crate::error::{Result, VaultError};

use super::{
    ErrorCode, OpCode, Request, Response, MASTER_KEY_LENGTH, MAX_FRAME_SIZE,
};

/// Size of the packed header at the start of every frame
pub const HEADER_SIZE: usize = 4;

/// Minimum body size of an add-entry request after the header
pub const ADD_REQUEST_MIN_SIZE: usize = MASTER_KEY_LENGTH + 16;

// =============================================================================
// Packed Header
// =============================================================================

/// The packed `version | opcode | flags` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub version: u8,
    pub op: u8,
    pub flags: u16,
}

impl PacketHeader {
    /// Pack into the 4-byte wire form
    pub fn to_u32(self) -> u32 {
        ((self.version as u32) << 24) | ((self.op as u32) << 16) | self.flags as u32
    }

    /// Unpack from the 4-byte wire form
    ///
    /// The flags mask covers the full low 16 bits; both flag bits live there.
    pub fn from_u32(value: u32) -> Self {
        Self {
            version: (value >> 24) as u8,
            op: (value >> 16) as u8,
            flags: (value & 0xFFFF) as u16,
        }
    }
}

// =============================================================================
// Server direction: decode Request / encode Response
// =============================================================================

/// Decode one request from a length-defined frame (outer prefix stripped).
///
/// Errors are connection-fatal: a short or garbled frame means the stream can
/// no longer be trusted, so the caller closes without responding.
pub fn decode_request(frame: Bytes) -> Result<Request> {
    if frame.len() < HEADER_SIZE {
        return Err(VaultError::Protocol(format!(
            "short frame: {} bytes, need at least {}",
            frame.len(),
            HEADER_SIZE
        )));
    }

    let hdr = PacketHeader::from_u32(read_u32(&frame, 0));
    let op = OpCode::from_u8(hdr.op).ok_or_else(|| {
        VaultError::Protocol(format!("unknown opcode: {}", hdr.op))
    })?;

    let body = &frame[HEADER_SIZE..];

    match op {
        OpCode::AddEntry => {
            if body.len() < ADD_REQUEST_MIN_SIZE {
                return Err(VaultError::Protocol(format!(
                    "invalid add entry request size: {} -- expecting at least: {}",
                    body.len(),
                    ADD_REQUEST_MIN_SIZE
                )));
            }

            // Master key is carried for protocol compatibility, not validated
            let ledger_id = read_i64(body, MASTER_KEY_LENGTH);
            let entry_id = read_i64(body, MASTER_KEY_LENGTH + 8);
            let payload = frame.slice(HEADER_SIZE + ADD_REQUEST_MIN_SIZE..);

            Ok(Request {
                protocol_version: hdr.version,
                op,
                ledger_id,
                entry_id,
                flags: hdr.flags,
                payload,
            })
        }

        OpCode::ReadEntry => {
            let fencing = hdr.flags & super::FLAG_DO_FENCING != 0;
            let required = 16 + if fencing { MASTER_KEY_LENGTH } else { 0 };
            if body.len() < required {
                return Err(VaultError::Protocol(format!(
                    "invalid read entry request size: {} -- expecting: {}",
                    body.len(),
                    required
                )));
            }

            let ledger_id = read_i64(body, 0);
            let entry_id = read_i64(body, 8);
            // Fencing reads carry the master key, which we skip unread

            Ok(Request {
                protocol_version: hdr.version,
                op,
                ledger_id,
                entry_id,
                flags: hdr.flags,
                payload: Bytes::new(),
            })
        }

        OpCode::Auth => Ok(Request {
            protocol_version: hdr.version,
            op,
            ledger_id: super::INVALID_LEDGER_ID,
            entry_id: super::INVALID_ENTRY_ID,
            flags: hdr.flags,
            payload: frame.slice(HEADER_SIZE..),
        }),
    }
}

/// Encode one response into a frame body (without the outer length prefix)
pub fn encode_response(response: &Response) -> Vec<u8> {
    let hdr = PacketHeader {
        version: response.protocol_version,
        op: response.op as u8,
        flags: 0,
    };

    let mut buf = Vec::with_capacity(HEADER_SIZE + 20 + response.payload.len());
    buf.extend_from_slice(&hdr.to_u32().to_be_bytes());

    match response.op {
        OpCode::AddEntry => {
            buf.extend_from_slice(&(response.error as i32).to_be_bytes());
            buf.extend_from_slice(&response.ledger_id.to_be_bytes());
            buf.extend_from_slice(&response.entry_id.to_be_bytes());
        }

        OpCode::ReadEntry => {
            buf.extend_from_slice(&(response.error as i32).to_be_bytes());
            buf.extend_from_slice(&response.ledger_id.to_be_bytes());
            buf.extend_from_slice(&response.entry_id.to_be_bytes());

            if response.error == ErrorCode::Ok {
                buf.extend_from_slice(&response.payload);
            }
        }

        OpCode::Auth => {
            buf.extend_from_slice(&response.payload);
        }
    }

    buf
}

// =============================================================================
// Client direction: encode Request / decode Response
// =============================================================================

/// Encode one request into a frame body (without the outer length prefix)
pub fn encode_request(request: &Request) -> Vec<u8> {
    let hdr = PacketHeader {
        version: request.protocol_version,
        op: request.op as u8,
        flags: request.flags,
    };

    let mut buf =
        Vec::with_capacity(HEADER_SIZE + ADD_REQUEST_MIN_SIZE + request.payload.len());
    buf.extend_from_slice(&hdr.to_u32().to_be_bytes());

    match request.op {
        OpCode::AddEntry => {
            // Placeholder master key; the server skips it
            buf.extend_from_slice(&[0u8; MASTER_KEY_LENGTH]);
            buf.extend_from_slice(&request.ledger_id.to_be_bytes());
            buf.extend_from_slice(&request.entry_id.to_be_bytes());
            buf.extend_from_slice(&request.payload);
        }

        OpCode::ReadEntry => {
            buf.extend_from_slice(&request.ledger_id.to_be_bytes());
            buf.extend_from_slice(&request.entry_id.to_be_bytes());
            if request.is_fencing() {
                buf.extend_from_slice(&[0u8; MASTER_KEY_LENGTH]);
            }
        }

        OpCode::Auth => {
            buf.extend_from_slice(&request.payload);
        }
    }

    buf
}

/// Decode one response from a length-defined frame (client side)
pub fn decode_response(frame: Bytes) -> Result<Response> {
    if frame.len() < HEADER_SIZE {
        return Err(VaultError::Protocol(format!(
            "short response frame: {} bytes",
            frame.len()
        )));
    }

    let hdr = PacketHeader::from_u32(read_u32(&frame, 0));
    let op = OpCode::from_u8(hdr.op).ok_or_else(|| {
        VaultError::Protocol(format!("unknown opcode in response: {}", hdr.op))
    })?;

    let body = &frame[HEADER_SIZE..];

    match op {
        OpCode::AddEntry | OpCode::ReadEntry => {
            if body.len() < 20 {
                return Err(VaultError::Protocol(format!(
                    "invalid response size: {} -- expecting at least: 20",
                    body.len()
                )));
            }

            let raw_error = read_i32(body, 0);
            let error = ErrorCode::from_i32(raw_error).ok_or_else(|| {
                VaultError::Protocol(format!("unknown error code: {}", raw_error))
            })?;
            let ledger_id = read_i64(body, 4);
            let entry_id = read_i64(body, 12);

            let payload = if op == OpCode::ReadEntry && error == ErrorCode::Ok {
                frame.slice(HEADER_SIZE + 20..)
            } else {
                Bytes::new()
            };

            Ok(Response {
                protocol_version: hdr.version,
                op,
                error,
                ledger_id,
                entry_id,
                payload,
            })
        }

        OpCode::Auth => Ok(Response {
            protocol_version: hdr.version,
            op,
            error: ErrorCode::Ok,
            ledger_id: super::INVALID_LEDGER_ID,
            entry_id: super::INVALID_ENTRY_ID,
            payload: frame.slice(HEADER_SIZE..),
        }),
    }
}

// =============================================================================
// Stream-based framing helpers
// =============================================================================

/// Read one length-prefixed frame from a stream.
///
/// Blocks until the full frame arrives. Rejects empty frames and frames
/// larger than [`MAX_FRAME_SIZE`].
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Bytes> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME_SIZE {
        return Err(VaultError::Protocol(format!(
            "invalid frame length: {} (max {})",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    Ok(Bytes::from(body))
}

/// Write one length-prefixed frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<()> {
    writer.write_all(&(body.len() as u32).to_be_bytes())?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Byte helpers
// =============================================================================

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(buf[at..at + 4].try_into().unwrap())
}

fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_be_bytes(buf[at..at + 4].try_into().unwrap())
}

fn read_i64(buf: &[u8], at: usize) -> i64 {
    i64::from_be_bytes(buf[at..at + 8].try_into().unwrap())
}
