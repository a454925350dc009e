//! Error taxonomy for the container search engine.
//!
//! Kinds mirror the propagation policy: `StorageTransient` and
//! `EmbeddingTransient` are meant to be retried by the caller before
//! surfacing; everything else is terminal for the operation that raised it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider changed; run purge first")]
    ProviderMismatch,

    #[error("storage error (retryable): {0}")]
    StorageTransient(String),

    #[error("storage corrupted: {0}")]
    StorageCorrupt(String),

    #[error("embedding service unavailable (retryable): {0}")]
    EmbeddingTransient(String),

    #[error("embedding service failed permanently: {0}")]
    EmbeddingPermanent(String),

    #[error("invalid request: {0}")]
    ClientInput(String),

    #[error("shutdown in progress")]
    ShutdownInProgress,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether the caller of `find`/`admin` should see a plain one-line
    /// message rather than a stack of internal detail.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            EngineError::ProviderMismatch
                | EngineError::ClientInput(_)
                | EngineError::ShutdownInProgress
        )
    }

    /// Exit/return code per §6: `1` on success, `0` on user error
    /// (permission, malformed arg, uninitialized, mismatch state).
    pub fn exit_code(&self) -> i32 {
        if self.is_user_facing() {
            0
        } else {
            1
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::StorageTransient(e.to_string())
    }
}

impl From<heed::Error> for EngineError {
    fn from(e: heed::Error) -> Self {
        EngineError::StorageTransient(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::StorageTransient(e.to_string())
    }
}
