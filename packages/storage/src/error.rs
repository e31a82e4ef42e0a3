// ABOUTME: Error types for storage operations
// ABOUTME: Covers IO, serialization, quota, permission, and tampering failures

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage quota exceeded: {requested} bytes requested, limit is {limit} bytes")]
    QuotaExceeded { requested: usize, limit: usize },

    #[error("Stored value for '{key}' is malformed or has been tampered with")]
    Tampered { key: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}
