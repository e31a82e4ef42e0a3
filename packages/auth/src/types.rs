// ABOUTME: Core type definitions for session authentication
// ABOUTME: Token pairs, user records, backend responses, and session status

use campus_core::mask_secret;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access/refresh token pair owned by the token vault
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64, // Unix timestamp, milliseconds
    pub user_id: String,
}

impl AuthToken {
    /// Check if token is expired, treating the last `buffer_ms` before expiry as expired
    pub fn is_expired(&self, now_millis: i64, buffer_ms: i64) -> bool {
        now_millis >= self.expires_at.saturating_sub(buffer_ms)
    }

    /// Check if token is usable (not expired)
    pub fn is_valid(&self, now_millis: i64, buffer_ms: i64) -> bool {
        !self.is_expired(now_millis, buffer_ms)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &mask_secret(&self.access_token))
            .field("refresh_token", &mask_secret(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Authenticated user record; mirrors the token's user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureAuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_first_time_user: bool,
}

/// Session-scoped record of the access token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredSession {
    pub access_token: String,
    pub expires_at: i64,
    pub user_id: String,
}

/// Durable record of the obfuscated refresh token and the user it belongs to
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredRefresh {
    pub token: String,
    pub user_id: String,
}

/// Token exchange response from the backend
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64, // Seconds
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &mask_secret(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(mask_secret))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Result of a successful login or registration
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub tokens: TokenResponse,
    pub user: SecureAuthUser,
}

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"****")
            .finish()
    }
}

#[derive(Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"****")
            .finish()
    }
}

/// Session state published to the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    LoggedOut,
    LoggedIn,
}
