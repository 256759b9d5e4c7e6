//! Error types for the session and interaction engine.

use std::time::Duration;

use thiserror::Error;

use crate::core::ids::ConversationId;

/// Failure reported by a response provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The backend could not be reached.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// The backend did not answer in time.
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
    /// The backend answered with an error.
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

/// Convenience result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EchoError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A write referenced a conversation that does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),
    /// Stored data could not be read back or written.
    #[error("persistence error: {0}")]
    Persistence(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Response provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EchoError {
    /// Whether this error belongs to the storage family.
    ///
    /// Callers keep the user's draft around when this returns `true`.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_)
                | Self::Persistence(_)
                | Self::Sqlite(_)
                | Self::TokioSqlite(_)
                | Self::Serialization(_)
        )
    }
}

/// Convenience result alias for engine operations.
pub type EchoResult<T> = Result<T, EchoError>;
