//! Error taxonomy for RPC handling.
//!
//! [`BrokerError`] is what a session reports back to an agent. Setup code (binding, log
//! rotation, CLI) stays on `anyhow`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a single RPC call can fail.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The call is not allowed in the current session state, or its fields are malformed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The call was well formed but its content is unusable.
    #[error("validation error: {0}")]
    Validation(String),

    /// The shared connection counter could not be updated.
    #[error("registry error: {0}")]
    Registry(String),

    /// The connection broke while reading or writing a frame.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl BrokerError {
    /// Wire category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::Protocol(_) => ErrorKind::Protocol,
            BrokerError::Validation(_) => ErrorKind::Validation,
            BrokerError::Registry(_) => ErrorKind::Registry,
            BrokerError::Transport(_) => ErrorKind::Transport,
        }
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        BrokerError::Protocol(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        BrokerError::Validation(msg.into())
    }
}

/// Error category as it travels on the wire.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Protocol,
    Validation,
    Registry,
    Transport,
}

/// Result alias for RPC handlers.
pub type BrokerResult<T> = Result<T, BrokerError>;
