// ABOUTME: Configuration for the Campus client security layer
// ABOUTME: Environment variable names, defaults, and validated SecurityConfig loading

pub mod constants;
pub mod settings;

pub use settings::{ConfigError, SecurityConfig};
