//! Node registration
//!
//! Advertises node liveness to an external coordination service. The core is
//! agnostic to the coordination protocol itself; it only needs a session
//! capable of creating ephemeral nodes, and a "session established"
//! notification to trigger (re-)registration after an expiry.

use crate::config::Config;
use crate::error::{Result, VaultError};

/// The one capability the node needs from a coordination service
pub trait CoordinationSession {
    /// Create an ephemeral node at `path`, tied to this session's liveness
    fn create_ephemeral(&self, path: &str) -> Result<()>;
}

/// Registers the node under `/ledgers/available/{host}:{port}`.
///
/// Call [`Registration::handle_session_established`] on every newly
/// established session, including re-establishment after expiry (the
/// previous ephemeral node is gone by then). A registration failure is
/// fatal to the process: a node that cannot advertise itself must not
/// serve traffic, so the caller is expected to exit on error.
pub struct Registration<S: CoordinationSession> {
    session: S,
    registration_path: String,
}

impl<S: CoordinationSession> Registration<S> {
    pub fn new(session: S, config: &Config) -> Self {
        Self {
            session,
            registration_path: config.registration_path(),
        }
    }

    /// Re-create the ephemeral registration node on a fresh session
    pub fn handle_session_established(&self) -> Result<()> {
        tracing::info!("registering node at {}", self.registration_path);

        self.session
            .create_ephemeral(&self.registration_path)
            .map_err(|e| {
                VaultError::Registration(format!(
                    "failed to register at {}: {}",
                    self.registration_path, e
                ))
            })?;

        tracing::info!("registered node at {}", self.registration_path);
        Ok(())
    }

    /// The derived registration path
    pub fn path(&self) -> &str {
        &self.registration_path
    }
}
