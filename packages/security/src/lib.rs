// ABOUTME: Client-side security primitives for Campus
// ABOUTME: Input sanitization and validation, CSRF tokens, rate limiting, crypto, and event logging

pub mod crypto;
pub mod csrf;
pub mod error;
pub mod events;
pub mod rate_limit;
pub mod sanitizer;
pub mod shortcuts;
pub mod validation;

// Re-export main types for convenience
pub use crypto::{CryptoError, CryptoPrimitives, CryptoResult, SymmetricKey};
pub use csrf::{CsrfGuard, CsrfPhase, CsrfState, CSRF_FORM_FIELD, CSRF_TOKEN_HEADER};
pub use error::{SecurityError, SecurityResult};
pub use events::{SecurityEvent, SecurityEventLog, Severity};
pub use rate_limit::RateLimiter;
pub use sanitizer::{sanitize_input, scan_threats, SanitizeError, Sanitizer, ThreatKind};
pub use shortcuts::{KeyChord, ShortcutGuard};
pub use validation::{
    validate_email, validate_input, validate_name, validate_password, validate_url,
    FormValidation, ValidationResult, ValidationRules, Validator,
};

// Storage checks used before trusting flags read back from durable storage
pub use campus_storage::{detect_storage_tampering, StoredType};
