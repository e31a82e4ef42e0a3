// ABOUTME: Human-readable rendering of validation results, headers, and security events
// ABOUTME: Kept free of terminal colors so output can be asserted in tests

use campus_core::mask_secret;
use campus_security::{SecurityEvent, ValidationResult, ValidationRules, Validator};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};

/// Field kinds the `validate` command understands
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationKind {
    Email,
    Password,
    Url,
    Name,
    /// Free text with only the default injection checks
    Text,
}

impl ValidationKind {
    pub fn validate(self, validator: &Validator, value: &str) -> ValidationResult {
        match self {
            ValidationKind::Email => validator.validate_email(value),
            ValidationKind::Password => validator.validate_password(value),
            ValidationKind::Url => validator.validate_url(value),
            ValidationKind::Name => validator.validate_name(value),
            ValidationKind::Text => validator.validate_input(value, &ValidationRules::new()),
        }
    }
}

/// Multi-line summary of a validation result
pub fn validation_report(kind: ValidationKind, result: &ValidationResult) -> String {
    let mut lines = Vec::with_capacity(result.errors.len() + 2);

    if result.is_valid {
        lines.push(format!("{:?}: valid", kind));
    } else {
        lines.push(format!("{:?}: invalid", kind));
        lines.extend(result.errors.iter().map(|e| format!("  - {}", e)));
    }

    // Passwords are never echoed back
    if kind != ValidationKind::Password && !result.sanitized_value.is_empty() {
        lines.push(format!("sanitized: {}", result.sanitized_value));
    }

    lines.join("\n")
}

/// Mask credentials in a header value, keeping the auth scheme readable
pub fn mask_header_value(value: &str) -> String {
    match value.split_once(' ') {
        Some((scheme, secret)) => format!("{} {}", scheme, mask_secret(secret)),
        None => mask_secret(value),
    }
}

pub fn events_table(events: &[SecurityEvent]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Time", "Type", "Severity", "Details"]);

    for event in events {
        let details = if event.details.is_empty() {
            "-".to_string()
        } else {
            serde_json::Value::Object(event.details.clone()).to_string()
        };

        table.add_row(vec![
            event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            event.event_type.clone(),
            event.severity.to_string(),
            details,
        ]);
    }

    table
}
