// ABOUTME: Campus session authentication library
// ABOUTME: Token vault, simulated auth backend, and the background refresh scheduler

pub mod backend;
pub mod error;
pub mod scheduler;
pub mod types;
pub mod vault;

// Re-export main types
pub use backend::{AuthBackend, SimulatedBackend};
pub use error::{AuthError, AuthResult};
pub use scheduler::{RefreshScheduler, TeardownHook};
pub use types::{
    AuthGrant, AuthToken, Credentials, Registration, SecureAuthUser, SessionStatus, TokenResponse,
};
pub use vault::{TokenVault, AUTH_SESSION_KEY, AUTH_USER_KEY, LEGACY_KEYS, REFRESH_TOKEN_KEY};
