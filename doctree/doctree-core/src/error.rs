//! Error taxonomy shared by the stores and the tree engine.

use thiserror::Error;

/// Errors surfaced by store implementations and tree operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Path, document or field does not exist.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Required input missing or malformed; the operation was not attempted.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Target of a create/rename is already occupied.
    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    /// Missing or rejected credentials, or an identity without access.
    #[error("access denied: {0}")]
    Auth(String),

    /// The store answered with an error status.
    #[error("store fault at {path} (status {status}): {reason}")]
    Fault {
        path: String,
        status: u16,
        reason: String,
    },

    /// Walk went deeper than the configured collection depth.
    #[error("depth limit of {limit} collections exceeded at {path}")]
    DepthExceeded { path: String, limit: usize },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(path: impl ToString) -> Self {
        Error::NotFound {
            path: path.to_string(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation(reason.into())
    }

    pub fn already_exists(path: impl ToString) -> Self {
        Error::AlreadyExists {
            path: path.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    /// Transport, status and codec failures from the external store.
    pub fn is_store_fault(&self) -> bool {
        matches!(
            self,
            Error::Fault { .. } | Error::Transport(_) | Error::Serialization(_) | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
