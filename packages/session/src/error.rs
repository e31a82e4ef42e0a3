// ABOUTME: Error types surfaced by the security facade's sign-in and registration flows
// ABOUTME: Wraps lower-layer failures so the UI gets one error enum

use campus_auth::AuthError;
use campus_security::{CryptoError, SecurityError};
use campus_storage::StorageError;
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Too many attempts. Please try again later")]
    RateLimited,

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
