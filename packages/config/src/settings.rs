use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::constants::*;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid number for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("Invalid boolean for {var}: {value}. Must be 'true' or 'false'")]
    InvalidBoolean { var: &'static str, value: String },
    #[error("{var}={value} is out of range ({min}-{max})")]
    OutOfRange {
        var: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("CSRF rotation interval must be shorter than the token lifetime")]
    RotationNotShorterThanLifetime,
    #[error("Persisted event tail ({persisted}) exceeds event log capacity ({capacity})")]
    PersistedExceedsCapacity { persisted: usize, capacity: usize },
}

/// Settings for every component of the security layer
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityConfig {
    /// Development mode disables the inspection-shortcut guard
    pub dev_mode: bool,
    /// Directory backing durable storage
    pub data_dir: PathBuf,
    pub csrf_token_lifetime: Duration,
    pub csrf_rotation_interval: Duration,
    /// Safety margin subtracted from access-token expiry
    pub token_expiry_buffer: Duration,
    pub token_refresh_interval: Duration,
    /// Lifetime of access tokens minted by the simulated backend
    pub access_token_lifetime: Duration,
    pub event_log_capacity: usize,
    pub event_log_persisted: usize,
    /// Global hard cap on validated input, independent of per-field rules
    pub max_input_length: usize,
    pub login_max_attempts: u32,
    pub login_window: Duration,
    pub registration_max_attempts: u32,
    pub registration_window: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            data_dir: campus_core::durable_store_dir(),
            csrf_token_lifetime: minutes(60),
            csrf_rotation_interval: minutes(30),
            token_expiry_buffer: Duration::from_secs(5 * 60),
            token_refresh_interval: minutes(15),
            access_token_lifetime: minutes(60),
            event_log_capacity: 100,
            event_log_persisted: 50,
            max_input_length: 10_000,
            login_max_attempts: 5,
            login_window: minutes(15),
            registration_max_attempts: 3,
            registration_window: minutes(60),
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let dev_mode = parse_bool(CAMPUS_DEV_MODE, defaults.dev_mode)?;

        let data_dir = env::var(CAMPUS_DATA_DIR)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let config = Self {
            dev_mode,
            data_dir,
            csrf_token_lifetime: minutes(parse_u64(
                CAMPUS_CSRF_TOKEN_LIFETIME_MINUTES,
                60,
                1,
                24 * 60,
            )?),
            csrf_rotation_interval: minutes(parse_u64(CAMPUS_CSRF_ROTATION_MINUTES, 30, 1, 24 * 60)?),
            token_expiry_buffer: Duration::from_secs(parse_u64(
                CAMPUS_TOKEN_EXPIRY_BUFFER_SECS,
                300,
                0,
                3600,
            )?),
            token_refresh_interval: minutes(parse_u64(
                CAMPUS_TOKEN_REFRESH_INTERVAL_MINUTES,
                15,
                1,
                24 * 60,
            )?),
            access_token_lifetime: minutes(parse_u64(
                CAMPUS_ACCESS_TOKEN_LIFETIME_MINUTES,
                60,
                6,
                24 * 60,
            )?),
            event_log_capacity: parse_u64(CAMPUS_EVENT_LOG_CAPACITY, 100, 1, 10_000)? as usize,
            event_log_persisted: parse_u64(CAMPUS_EVENT_LOG_PERSISTED, 50, 0, 10_000)? as usize,
            max_input_length: parse_u64(CAMPUS_MAX_INPUT_LENGTH, 10_000, 1, 1_000_000)? as usize,
            login_max_attempts: parse_u64(CAMPUS_LOGIN_MAX_ATTEMPTS, 5, 1, 1_000)? as u32,
            login_window: minutes(parse_u64(CAMPUS_LOGIN_WINDOW_MINUTES, 15, 1, 24 * 60)?),
            registration_max_attempts: parse_u64(CAMPUS_REGISTER_MAX_ATTEMPTS, 3, 1, 1_000)? as u32,
            registration_window: minutes(parse_u64(CAMPUS_REGISTER_WINDOW_MINUTES, 60, 1, 24 * 60)?),
        };

        config.validate()?;

        debug!(
            dev_mode = config.dev_mode,
            data_dir = %config.data_dir.display(),
            "Loaded security configuration"
        );

        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.csrf_rotation_interval >= self.csrf_token_lifetime {
            return Err(ConfigError::RotationNotShorterThanLifetime);
        }

        if self.event_log_persisted > self.event_log_capacity {
            return Err(ConfigError::PersistedExceedsCapacity {
                persisted: self.event_log_persisted,
                capacity: self.event_log_capacity,
            });
        }

        Ok(())
    }

    /// Same configuration with durable storage rooted elsewhere
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

fn parse_u64(var: &'static str, default: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
    let value = match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber {
                var,
                value: raw.clone(),
            })?,
        Err(_) => return Ok(default),
    };

    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            var,
            value,
            min,
            max,
        });
    }

    Ok(value)
}

fn parse_bool(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(var) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidBoolean { var, value: raw }),
        },
        Err(_) => Ok(default),
    }
}
