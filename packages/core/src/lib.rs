// ABOUTME: Core types, traits, and utilities for the Campus client security layer
// ABOUTME: Foundational package providing the clock abstraction and shared helpers

pub mod clock;
pub mod constants;
pub mod utils;

// Re-export clock types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

// Re-export constants
pub use constants::{campus_dir, durable_store_dir};

// Re-export utilities
pub use utils::mask_secret;
