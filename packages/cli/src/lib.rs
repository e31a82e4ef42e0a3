// ABOUTME: Library half of the campus CLI
// ABOUTME: Logging setup and the plain-text reports the binary prints

pub mod report;
pub mod telemetry;

pub use report::{events_table, mask_header_value, validation_report, ValidationKind};
pub use telemetry::init_tracing;
