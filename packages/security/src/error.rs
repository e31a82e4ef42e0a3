// ABOUTME: Error types for the security components
// ABOUTME: Wraps storage and crypto failures so guards can propagate them uniformly

use campus_storage::StorageError;
use thiserror::Error;

use crate::crypto::CryptoError;

pub type SecurityResult<T> = Result<T, SecurityError>;

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}
