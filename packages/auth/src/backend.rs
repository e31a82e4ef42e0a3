// ABOUTME: Authentication backend abstraction and a local simulated implementation
// ABOUTME: The simulated backend mints random tokens and can be told to fail refreshes

use async_trait::async_trait;
use campus_security::CryptoPrimitives;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    types::{AuthGrant, Credentials, Registration, SecureAuthUser, TokenResponse},
};

const ACCESS_TOKEN_PREFIX: &str = "at_";
const REFRESH_TOKEN_PREFIX: &str = "rt_";
const TOKEN_BYTES: usize = 32;

/// Remote side of login, registration, and token refresh
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> AuthResult<AuthGrant>;

    async fn register(&self, registration: &Registration) -> AuthResult<AuthGrant>;

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse>;
}

/// In-process backend standing in for a real auth server
pub struct SimulatedBackend {
    crypto: Arc<CryptoPrimitives>,
    access_token_lifetime: Duration,
    latency: Duration,
    fail_refresh: AtomicBool,
    refresh_calls: AtomicU32,
}

impl SimulatedBackend {
    pub fn new(crypto: Arc<CryptoPrimitives>, access_token_lifetime: Duration) -> Self {
        Self {
            crypto,
            access_token_lifetime,
            latency: Duration::ZERO,
            fail_refresh: AtomicBool::new(false),
            refresh_calls: AtomicU32::new(0),
        }
    }

    /// Delay every call to mimic a network round trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make subsequent refreshes fail (expired or revoked refresh token)
    pub fn set_fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Number of refresh exchanges attempted so far
    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn mint_tokens(&self) -> AuthResult<TokenResponse> {
        Ok(TokenResponse {
            access_token: format!(
                "{}{}",
                ACCESS_TOKEN_PREFIX,
                self.crypto.random_token(TOKEN_BYTES)?
            ),
            refresh_token: Some(format!(
                "{}{}",
                REFRESH_TOKEN_PREFIX,
                self.crypto.random_token(TOKEN_BYTES)?
            )),
            expires_in: i64::try_from(self.access_token_lifetime.as_secs()).unwrap_or(i64::MAX),
        })
    }

    fn user_for(email: &str, name: Option<&str>, is_first_time_user: bool) -> SecureAuthUser {
        let email = email.trim().to_lowercase();
        let digest = CryptoPrimitives::sha256_hex(email.as_bytes());

        let name = match name {
            Some(name) => name.trim().to_string(),
            None => display_name_from_email(&email),
        };

        SecureAuthUser {
            id: format!("user_{}", &digest[..16]),
            email,
            name,
            is_first_time_user,
        }
    }
}

#[async_trait]
impl AuthBackend for SimulatedBackend {
    async fn login(&self, credentials: &Credentials) -> AuthResult<AuthGrant> {
        self.simulate_latency().await;

        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = Self::user_for(&credentials.email, None, false);
        info!(user_id = %user.id, "Simulated login succeeded");

        Ok(AuthGrant {
            tokens: self.mint_tokens()?,
            user,
        })
    }

    async fn register(&self, registration: &Registration) -> AuthResult<AuthGrant> {
        self.simulate_latency().await;

        if registration.email.trim().is_empty() || registration.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = Self::user_for(&registration.email, Some(&registration.name), true);
        info!(user_id = %user.id, "Simulated registration succeeded");

        Ok(AuthGrant {
            tokens: self.mint_tokens()?,
            user,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_refresh.load(Ordering::SeqCst) {
            warn!("Simulated refresh rejected");
            return Err(AuthError::RefreshFailed(
                "Refresh token expired or revoked".to_string(),
            ));
        }

        if !refresh_token.starts_with(REFRESH_TOKEN_PREFIX) {
            return Err(AuthError::RefreshFailed(
                "Malformed refresh token".to_string(),
            ));
        }

        debug!("Simulated refresh succeeded");
        self.mint_tokens()
    }
}

/// "ada.lovelace@example.com" -> "Ada Lovelace"
fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();

    local
        .split(['.', '_', '-', '+'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SimulatedBackend {
        SimulatedBackend::new(
            Arc::new(CryptoPrimitives::new().unwrap()),
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_login_mints_tokens_and_user() {
        let backend = backend();
        let grant = backend
            .login(&Credentials {
                email: "Ada.Lovelace@Example.com".to_string(),
                password: "Tr0ub4dor&3xyz".to_string(),
            })
            .await
            .unwrap();

        assert!(grant.tokens.access_token.starts_with(ACCESS_TOKEN_PREFIX));
        assert!(grant
            .tokens
            .refresh_token
            .as_deref()
            .is_some_and(|t| t.starts_with(REFRESH_TOKEN_PREFIX)));
        assert_eq!(grant.tokens.expires_in, 3600);
        assert_eq!(grant.user.email, "ada.lovelace@example.com");
        assert_eq!(grant.user.name, "Ada Lovelace");
        assert!(!grant.user.is_first_time_user);
    }

    #[tokio::test]
    async fn test_user_id_stable_across_login_and_register() {
        let backend = backend();
        let registered = backend
            .register(&Registration {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        let logged_in = backend
            .login(&Credentials {
                email: "ADA@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(registered.user.id, logged_in.user.id);
        assert!(registered.user.is_first_time_user);
    }

    #[tokio::test]
    async fn test_refresh_failure_switch() {
        let backend = backend();
        assert!(backend.refresh("rt_valid").await.is_ok());
        assert!(backend.refresh("bogus").await.is_err());

        backend.set_fail_refresh(true);
        assert!(matches!(
            backend.refresh("rt_valid").await,
            Err(AuthError::RefreshFailed(_))
        ));
        assert_eq!(backend.refresh_calls(), 3);
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let backend = backend();
        let result = tokio_test::block_on(backend.login(&Credentials {
            email: "  ".to_string(),
            password: "pw".to_string(),
        }));
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn test_display_name_from_email() {
        assert_eq!(display_name_from_email("grace_hopper@navy.mil"), "Grace Hopper");
        assert_eq!(display_name_from_email("x@y.z"), "X");
    }
}
