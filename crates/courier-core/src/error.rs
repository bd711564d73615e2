//! Error types for the Courier core.
//!
//! Errors raised by the dispatcher itself live in `courier-framework`; this
//! module only covers failures reported by the transport collaborator.

use thiserror::Error;

/// Errors a [`Client`](crate::Client) can report back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The platform rate-limited the request.
    #[error("a wait of {seconds} seconds is required (caused by {request})")]
    FloodWait {
        /// How long the platform asks the client to wait.
        seconds: u64,
        /// Name of the request that was rejected.
        request: String,
    },

    /// The platform rejected the request with a protocol error.
    #[error("RPC error {code}: {message} (caused by {request})")]
    Rpc {
        code: i32,
        message: String,
        request: String,
    },

    /// The update being answered carries no message to edit or reply to.
    #[error("update has no message to answer")]
    NoMessage,

    /// The connection to the platform is gone.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Creates a flood-wait error.
    pub fn flood_wait(seconds: u64, request: impl Into<String>) -> Self {
        Self::FloodWait {
            seconds,
            request: request.into(),
        }
    }

    /// Creates a protocol error.
    pub fn rpc(code: i32, message: impl Into<String>, request: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            request: request.into(),
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
