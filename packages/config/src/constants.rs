// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Campus

// Development Configuration
pub const CAMPUS_DEV_MODE: &str = "CAMPUS_DEV_MODE";
pub const CAMPUS_DATA_DIR: &str = "CAMPUS_DATA_DIR";

// CSRF Protection
pub const CAMPUS_CSRF_TOKEN_LIFETIME_MINUTES: &str = "CAMPUS_CSRF_TOKEN_LIFETIME_MINUTES";
pub const CAMPUS_CSRF_ROTATION_MINUTES: &str = "CAMPUS_CSRF_ROTATION_MINUTES";

// Session Tokens
pub const CAMPUS_TOKEN_EXPIRY_BUFFER_SECS: &str = "CAMPUS_TOKEN_EXPIRY_BUFFER_SECS";
pub const CAMPUS_TOKEN_REFRESH_INTERVAL_MINUTES: &str = "CAMPUS_TOKEN_REFRESH_INTERVAL_MINUTES";
pub const CAMPUS_ACCESS_TOKEN_LIFETIME_MINUTES: &str = "CAMPUS_ACCESS_TOKEN_LIFETIME_MINUTES";

// Security Event Log
pub const CAMPUS_EVENT_LOG_CAPACITY: &str = "CAMPUS_EVENT_LOG_CAPACITY";
pub const CAMPUS_EVENT_LOG_PERSISTED: &str = "CAMPUS_EVENT_LOG_PERSISTED";

// Input Validation
pub const CAMPUS_MAX_INPUT_LENGTH: &str = "CAMPUS_MAX_INPUT_LENGTH";

// Rate Limiting
pub const CAMPUS_LOGIN_MAX_ATTEMPTS: &str = "CAMPUS_LOGIN_MAX_ATTEMPTS";
pub const CAMPUS_LOGIN_WINDOW_MINUTES: &str = "CAMPUS_LOGIN_WINDOW_MINUTES";
pub const CAMPUS_REGISTER_MAX_ATTEMPTS: &str = "CAMPUS_REGISTER_MAX_ATTEMPTS";
pub const CAMPUS_REGISTER_WINDOW_MINUTES: &str = "CAMPUS_REGISTER_WINDOW_MINUTES";
