//! Crate-wide error type.
//!
//! Every failure is classified into one of three kinds. The kind decides what
//! the consumer does with the message that caused it:
//!
//! - [`ErrorKind::Validation`]: malformed or missing data. Retrying cannot
//!   help, so the message is acknowledged and dropped.
//! - [`ErrorKind::Transient`]: a store or the broker is unavailable. The
//!   message stays unacknowledged and the broker redelivers it.
//! - [`ErrorKind::NotFound`]: a referenced entity is missing. Surfaced loudly
//!   and redelivered like a transient failure.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("dependency unavailable: {0}")]
    Transient(String),

    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Coarse failure classes used for delivery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transient,
    NotFound,
}

impl Error {
    /// Malformed or missing input.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// A dependency that may be back on retry.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// `entity` with `id` does not exist.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Invalid configuration or wiring.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Serialization(_) | Error::Configuration(_) => {
                ErrorKind::Validation
            }
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Transient(_) | Error::LockPoisoned(_) | Error::Cancelled => {
                ErrorKind::Transient
            }
        }
    }

    /// Whether redelivering the message that caused this error could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Validation
    }
}
