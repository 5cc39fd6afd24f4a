//! Request and response definitions
//!
//! Typed forms of the wire messages exchanged with clients.

use bytes::Bytes;

/// Protocol version spoken by this node
pub const PROTOCOL_VERSION: u8 = 2;

/// Length of the (unvalidated) master-key field carried by add requests and
/// fencing reads
pub const MASTER_KEY_LENGTH: usize = 20;

/// Maximum size of a single frame, excluding the outer length prefix
pub const MAX_FRAME_SIZE: usize = 5 * 1024 * 1024;

/// Sentinel ledger id for responses that carry no ledger
pub const INVALID_LEDGER_ID: i64 = -1;

/// Sentinel entry id for responses that carry no entry
pub const INVALID_ENTRY_ID: i64 = -1;

/// Fencing read: the request also asserts exclusive-write intent
pub const FLAG_DO_FENCING: u16 = 0x0001;

/// Recovery read issued while a ledger is being recovered
pub const FLAG_RECOVERY: u16 = 0x0002;

/// Operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Append one ledger entry; payload is the entry exactly as logged
    AddEntry = 1,

    /// Read one ledger entry by (ledger, entry) id
    ReadEntry = 2,

    /// Auth hand-off between client and server auth providers; payload is
    /// opaque to this node
    Auth = 3,
}

impl OpCode {
    /// Map a wire byte to an opcode
    pub fn from_u8(value: u8) -> Option<OpCode> {
        match value {
            1 => Some(OpCode::AddEntry),
            2 => Some(OpCode::ReadEntry),
            3 => Some(OpCode::Auth),
            _ => None,
        }
    }
}

/// Closed set of response error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// Success
    Ok = 0,

    /// The ledger does not exist
    NoLedger = 1,

    /// The requested entry does not exist
    NoEntry = 2,

    /// Invalid request
    BadRequest = 100,

    /// General error occurred at the server
    IoError = 101,

    /// Unauthorized access to ledger
    UnauthorizedAccess = 102,

    /// The server version is incompatible with the client
    BadVersion = 103,

    /// Attempt to write to a fenced ledger
    Fenced = 104,

    /// The server is running in read-only mode
    ReadOnly = 105,

    /// Too many concurrent requests
    TooManyRequests = 106,
}

impl ErrorCode {
    /// Map a wire value to an error code
    pub fn from_i32(value: i32) -> Option<ErrorCode> {
        match value {
            0 => Some(ErrorCode::Ok),
            1 => Some(ErrorCode::NoLedger),
            2 => Some(ErrorCode::NoEntry),
            100 => Some(ErrorCode::BadRequest),
            101 => Some(ErrorCode::IoError),
            102 => Some(ErrorCode::UnauthorizedAccess),
            103 => Some(ErrorCode::BadVersion),
            104 => Some(ErrorCode::Fenced),
            105 => Some(ErrorCode::ReadOnly),
            106 => Some(ErrorCode::TooManyRequests),
            _ => None,
        }
    }
}

/// A decoded request
///
/// Owned by the connection that decoded it until handed to the engine, which
/// takes ownership of the payload buffer.
#[derive(Debug, Clone)]
pub struct Request {
    pub protocol_version: u8,
    pub op: OpCode,
    pub ledger_id: i64,
    pub entry_id: i64,
    pub flags: u16,

    /// Entry payload for AddEntry, opaque bytes for Auth, empty otherwise
    pub payload: Bytes,
}

impl Request {
    /// Build an add-entry request at the current protocol version
    pub fn add_entry(ledger_id: i64, entry_id: i64, payload: Bytes) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            op: OpCode::AddEntry,
            ledger_id,
            entry_id,
            flags: 0,
            payload,
        }
    }

    /// Build a read-entry request at the current protocol version
    pub fn read_entry(ledger_id: i64, entry_id: i64, flags: u16) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            op: OpCode::ReadEntry,
            ledger_id,
            entry_id,
            flags,
            payload: Bytes::new(),
        }
    }

    pub fn is_fencing(&self) -> bool {
        self.flags & FLAG_DO_FENCING != 0
    }

    pub fn is_recovery(&self) -> bool {
        self.flags & FLAG_RECOVERY != 0
    }
}

/// A response to send to a client
///
/// Constructed fresh per request; never shared.
#[derive(Debug, Clone)]
pub struct Response {
    pub protocol_version: u8,
    pub op: OpCode,
    pub error: ErrorCode,
    pub ledger_id: i64,
    pub entry_id: i64,

    /// Entry payload for a successful ReadEntry, opaque bytes for Auth
    pub payload: Bytes,
}

impl Response {
    /// Response for a request addressed to (ledger, entry)
    pub fn new(op: OpCode, error: ErrorCode, ledger_id: i64, entry_id: i64) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            op,
            error,
            ledger_id,
            entry_id,
            payload: Bytes::new(),
        }
    }

    /// Attach a payload (successful reads)
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }
}
