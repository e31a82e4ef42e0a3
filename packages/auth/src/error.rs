// ABOUTME: Error types for session authentication and token management
// ABOUTME: Covers token validity, refresh failures, backend rejections, and storage/crypto faults

use campus_security::CryptoError;
use campus_storage::StorageError;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("User {user_id} does not match the active session")]
    UserMismatch { user_id: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
