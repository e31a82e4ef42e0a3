// ABOUTME: Session facade for the Campus client
// ABOUTME: Composes token vault, CSRF guard, validator, rate limiter, and event log behind one API

pub mod error;
pub mod facade;

// Re-export main types
pub use error::{SessionError, SessionResult};
pub use facade::{SecurityFacade, AUTHORIZATION_HEADER, DURABLE_STORE_NAME};

// Types callers need to drive the facade
pub use campus_auth::{SecureAuthUser, SessionStatus};
pub use campus_config::SecurityConfig;
pub use campus_security::{KeyChord, SecurityEvent, Severity, ValidationResult, ValidationRules};
