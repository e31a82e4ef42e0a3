// ABOUTME: Token vault owning the authenticated session
// ABOUTME: Stores access tokens in session storage and the obfuscated refresh token durably

use campus_core::SharedClock;
use campus_security::CryptoPrimitives;
use campus_storage::{KeyValueStore, StorageBackends, StorageScope, TypedSlot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    backend::AuthBackend,
    error::{AuthError, AuthResult},
    types::{AuthToken, SecureAuthUser, StoredRefresh, StoredSession},
};

/// Session storage key for the access token record
pub const AUTH_SESSION_KEY: &str = "auth_session";

/// Session storage key for the user record
pub const AUTH_USER_KEY: &str = "auth_user";

/// Durable storage key for the obfuscated refresh token and its user id
pub const REFRESH_TOKEN_KEY: &str = "auth_refresh_token";

/// Keys written by earlier client versions, removed on every clear
pub const LEGACY_KEYS: &[&str] = &[
    "authToken",
    "refreshToken",
    "user",
    "userData",
    "isAuthenticated",
    "tokenExpiry",
];

pub struct TokenVault {
    backends: StorageBackends,
    clock: SharedClock,
    crypto: Arc<CryptoPrimitives>,
    backend: Arc<dyn AuthBackend>,
    expiry_buffer_ms: i64,
    session_slot: TypedSlot<StoredSession>,
    user_slot: TypedSlot<SecureAuthUser>,
    refresh_slot: TypedSlot<StoredRefresh>,
}

impl TokenVault {
    pub fn new(
        backends: StorageBackends,
        clock: SharedClock,
        crypto: Arc<CryptoPrimitives>,
        backend: Arc<dyn AuthBackend>,
        expiry_buffer: Duration,
    ) -> Self {
        Self {
            backends,
            clock,
            crypto,
            backend,
            expiry_buffer_ms: i64::try_from(expiry_buffer.as_millis()).unwrap_or(i64::MAX),
            session_slot: TypedSlot::new(AUTH_SESSION_KEY),
            user_slot: TypedSlot::new(AUTH_USER_KEY),
            refresh_slot: TypedSlot::new(REFRESH_TOKEN_KEY),
        }
    }

    /// Persist a freshly issued token pair.
    ///
    /// Rejects tokens whose expiry is not in the future. A failed write
    /// clears all auth state so no half-stored session stays usable.
    pub fn store_tokens(&self, token: &AuthToken) -> AuthResult<()> {
        let now = self.clock.now_millis();
        if token.expires_at <= now {
            return Err(AuthError::InvalidToken(
                "Token expiry must be in the future".to_string(),
            ));
        }

        if let Err(e) = self.write_tokens(token) {
            error!(error = %e, "Failed to store auth tokens, clearing session");
            if let Err(clear_err) = self.clear_auth() {
                error!(error = %clear_err, "Failed to clear partially stored session");
            }
            return Err(e);
        }

        debug!(
            user_id = %token.user_id,
            expires_at = token.expires_at,
            "Stored auth tokens"
        );
        Ok(())
    }

    /// Access token, if one exists and is outside the expiry buffer
    pub fn get_access_token(&self) -> Option<String> {
        let session = self.session_slot.read_or_absent(self.session_store())?;
        let now = self.clock.now_millis();

        if now < session.expires_at.saturating_sub(self.expiry_buffer_ms) {
            Some(session.access_token)
        } else {
            debug!("Access token missing or within expiry buffer");
            None
        }
    }

    /// Expiry instant of the stored access token, live or not
    pub fn expires_at(&self) -> Option<i64> {
        self.session_slot
            .read_or_absent(self.session_store())
            .map(|session| session.expires_at)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_access_token().is_some()
    }

    /// Replace the user record of the active session
    pub fn store_user_data(&self, user: &SecureAuthUser) -> AuthResult<()> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        let session_user = self
            .session_slot
            .read_or_absent(self.session_store())
            .map(|session| session.user_id);
        if session_user.as_deref() != Some(user.id.as_str()) {
            return Err(AuthError::UserMismatch {
                user_id: user.id.clone(),
            });
        }

        self.user_slot.write(self.session_store(), user)?;
        Ok(())
    }

    /// User record of the active session; nothing once the session is stale
    pub fn get_current_user(&self) -> Option<SecureAuthUser> {
        if !self.is_authenticated() {
            return None;
        }
        self.user_slot.read_or_absent(self.session_store())
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// Any failure clears all auth state so the caller can force a logout.
    pub async fn refresh_tokens(&self) -> AuthResult<AuthToken> {
        match self.exchange_refresh_token().await {
            Ok(token) => {
                info!(user_id = %token.user_id, "Refreshed auth tokens");
                Ok(token)
            }
            Err(e) => {
                warn!(audit = true, error = %e, "Token refresh failed, clearing session");
                if let Err(clear_err) = self.clear_auth() {
                    error!(error = %clear_err, "Failed to clear auth state after refresh failure");
                }
                Err(e)
            }
        }
    }

    /// Remove every session and durable key tied to the session. Safe to repeat.
    pub fn clear_auth(&self) -> AuthResult<()> {
        let mut first_error = None;

        let removals = [
            (StorageScope::Session, AUTH_SESSION_KEY),
            (StorageScope::Session, AUTH_USER_KEY),
            (StorageScope::Durable, REFRESH_TOKEN_KEY),
        ]
        .into_iter()
        .chain(LEGACY_KEYS.iter().flat_map(|key| {
            [(StorageScope::Session, *key), (StorageScope::Durable, *key)]
        }));

        for (scope, key) in removals {
            if let Err(e) = self.backends.store(scope).remove(key) {
                error!(key, error = %e, "Failed to remove auth key");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => {
                debug!("Auth state cleared");
                Ok(())
            }
        }
    }

    // Durable record first: the session record is what makes the vault authenticated
    fn write_tokens(&self, token: &AuthToken) -> AuthResult<()> {
        // Placeholder obfuscation, not encryption
        let refresh = StoredRefresh {
            token: self.crypto.obfuscate(&token.refresh_token),
            user_id: token.user_id.clone(),
        };
        self.refresh_slot.write(self.durable_store(), &refresh)?;

        let session = StoredSession {
            access_token: token.access_token.clone(),
            expires_at: token.expires_at,
            user_id: token.user_id.clone(),
        };
        self.session_slot.write(self.session_store(), &session)?;
        Ok(())
    }

    async fn exchange_refresh_token(&self) -> AuthResult<AuthToken> {
        let (refresh_token, user_id) = self.read_refresh_token()?;

        let response = self.backend.refresh(&refresh_token).await?;

        let token = AuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or(refresh_token),
            expires_at: self.clock.now_millis() + response.expires_in.saturating_mul(1000),
            user_id,
        };

        self.store_tokens(&token)?;
        Ok(token)
    }

    /// Deobfuscated refresh token and its user id. Works without a session
    /// record, so a restarted process can resume from durable storage.
    fn read_refresh_token(&self) -> AuthResult<(String, String)> {
        let stored = self
            .refresh_slot
            .read(self.durable_store())?
            .ok_or_else(|| AuthError::TokenNotFound("No refresh token available".to_string()))?;

        if let Some(session) = self.session_slot.read_or_absent(self.session_store()) {
            if session.user_id != stored.user_id {
                return Err(AuthError::UserMismatch {
                    user_id: stored.user_id,
                });
            }
        }

        let token = self.crypto.deobfuscate(&stored.token)?;
        Ok((token, stored.user_id))
    }

    fn session_store(&self) -> &dyn KeyValueStore {
        self.backends.store(StorageScope::Session).as_ref()
    }

    fn durable_store(&self) -> &dyn KeyValueStore {
        self.backends.store(StorageScope::Durable).as_ref()
    }
}
