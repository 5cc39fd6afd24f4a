//! Network Module
//!
//! TCP server and per-connection handlers.
//!
//! One pipeline per accepted connection: length framing → protocol codec →
//! dispatcher → engine. Responses are written serially on the connection's
//! own thread, so per-connection response order matches request order.

mod connection;
mod server;

pub use connection::Connection;
pub use server::Server;
