//! Protocol Module
//!
//! Defines the bookie wire protocol for client-server communication.
//!
//! ## Protocol Format (V2 binary)
//!
//! Each frame is prefixed with a 4-byte big-endian length (max 5 MiB) and
//! starts with a packed 4-byte header:
//!
//! ```text
//! ┌────────────┬────────────┬──────────────┬ ─ ─ ─ ─ ─ ─ ─ ┐
//! │ version(8) │ opcode(8)  │   flags(16)  │  opcode body
//! └────────────┴────────────┴──────────────┴ ─ ─ ─ ─ ─ ─ ─ ┘
//! ```
//!
//! ### OpCodes
//! - 1: ADD_ENTRY  — master key (20) + ledger (8) + entry (8) + payload
//! - 2: READ_ENTRY — ledger (8) + entry (8) [+ master key (20) iff fencing]
//! - 3: AUTH       — opaque auth-provider payload
//!
//! ### Error Codes
//! - 0: OK, 1: NoLedger, 2: NoEntry
//! - 100..106: BadRequest, IOError, UnauthorizedAccess, BadVersion,
//!   Fenced, ReadOnly, TooManyRequests

mod codec;
mod message;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_frame,
    write_frame, PacketHeader, ADD_REQUEST_MIN_SIZE, HEADER_SIZE,
};
pub use message::{
    ErrorCode, OpCode, Request, Response, FLAG_DO_FENCING, FLAG_RECOVERY,
    INVALID_ENTRY_ID, INVALID_LEDGER_ID, MASTER_KEY_LENGTH, MAX_FRAME_SIZE,
    PROTOCOL_VERSION,
};
