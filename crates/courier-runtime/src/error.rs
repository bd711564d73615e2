//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The ingress loop has stopped and no longer accepts events.
    #[error("Event ingress is closed")]
    IngressClosed,

    /// The event queue is full.
    #[error("Event ingress is full")]
    IngressFull,

    /// `run` was called while the runtime was already running or after it stopped.
    #[error("Runtime has already been started")]
    AlreadyStarted,

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
