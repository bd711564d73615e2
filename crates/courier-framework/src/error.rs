//! Error types for the Courier framework.

use std::any::Any;

use thiserror::Error;

use courier_core::TransportError;

/// Why a handler invocation failed.
///
/// Handlers may return any error convertible into this type; `anyhow`
/// errors are accepted as-is.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A transport call made by the handler failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The handler reported a failure of its own.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Creates a failure from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        Self::Failed(anyhow::Error::msg(message))
    }

    /// Converts a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked(message)
    }

    /// The transport error behind this failure, if any.
    ///
    /// Looks through `anyhow` wrappers as well.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Failed(e) => e.downcast_ref::<TransportError>(),
            Self::Panicked(_) => None,
        }
    }

    /// Multi-line description including the cause chain.
    pub fn details(&self) -> String {
        match self {
            Self::Failed(e) => format!("{e:?}"),
            other => other.to_string(),
        }
    }
}

/// Result type returned by handlers.
pub type HandlerResult = Result<(), HandlerError>;
