// ABOUTME: Rule-driven input validation composed with sanitization and threat scanning
// ABOUTME: Email, password, URL, name, and whole-form validators built on validate_input

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error};
use url::{Host, Url};

use crate::sanitizer::{scan_threats, Sanitizer, DEFAULT_MAX_INPUT_LENGTH, SANITIZE_FAILURE_MESSAGE};

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const PASSWORD_MAX_LENGTH: usize = 128;
pub const URL_MAX_LENGTH: usize = 2048;
pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 100;

/// Hostname prefixes that point at loopback, link-local, or private networks
pub const BLOCKED_HOST_PREFIXES: &[&str] = &[
    "localhost",
    "127.",
    "0.",
    "10.",
    "192.168.",
    "169.254.",
    "[::1]",
    "[fc",
    "[fd",
    "[fe80",
];

static EMAIL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
});

static NAME_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| compile(r"^\p{L}[\p{L} '\-]*$"));

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            error!(pattern, error = %e, "Failed to compile validation pattern");
            None
        }
    }
}

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Extra check with its own error message
pub struct CustomRule {
    check: Predicate,
    message: String,
}

impl CustomRule {
    pub fn new(check: impl Fn(&str) -> bool + Send + Sync + 'static, message: impl Into<String>) -> Self {
        Self {
            check: Box::new(check),
            message: message.into(),
        }
    }

    pub fn passes(&self, value: &str) -> bool {
        (self.check)(value)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Per-call validation configuration
#[derive(Debug, Default)]
pub struct ValidationRules {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<(Regex, String)>,
    pub custom: Vec<CustomRule>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, regex: Regex, message: impl Into<String>) -> Self {
        self.pattern = Some((regex, message.into()));
        self
    }

    /// Use a shared pattern; an unavailable pattern fails every value
    fn shared_pattern(self, regex: &Lazy<Option<Regex>>, message: &str) -> Self {
        match &**regex {
            Some(regex) => self.pattern(regex.clone(), message),
            None => self.custom(|_| false, "Validation pattern unavailable"),
        }
    }

    pub fn custom(
        mut self,
        check: impl Fn(&str) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        self.custom.push(CustomRule::new(check, message));
        self
    }
}

/// Outcome of validating one value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Best-effort sanitized input, never the raw value
    pub sanitized_value: String,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>, sanitized_value: String) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            sanitized_value,
        }
    }
}

/// Outcome of validating a whole form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormValidation {
    pub is_valid: bool,
    pub fields: BTreeMap<String, ValidationResult>,
}

/// Validator bound to a global input length cap
#[derive(Debug, Clone)]
pub struct Validator {
    sanitizer: Sanitizer,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_LENGTH)
    }
}

impl Validator {
    pub fn new(max_input_length: usize) -> Self {
        Self {
            sanitizer: Sanitizer::new(max_input_length),
        }
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Validate `raw` against `rules`.
    ///
    /// Checks run in order: required, length bounds, global cap, pattern,
    /// threat scan, custom predicates. Sanitization always runs.
    pub fn validate_input(&self, raw: &str, rules: &ValidationRules) -> ValidationResult {
        let mut errors = Vec::new();
        let trimmed = raw.trim();
        let length = trimmed.chars().count();

        if trimmed.is_empty() {
            if rules.required {
                errors.push("This field is required".to_string());
            }
        } else {
            if let Some(min) = rules.min_length {
                if length < min {
                    errors.push(format!("Must be at least {} characters", min));
                }
            }
            if let Some(max) = rules.max_length {
                if length > max {
                    errors.push(format!("Must be no more than {} characters", max));
                }
            }

            let cap = self.sanitizer.max_input_length();
            if raw.chars().count() > cap {
                errors.push(format!(
                    "Input exceeds maximum allowed length of {} characters",
                    cap
                ));
            }

            if let Some((regex, message)) = &rules.pattern {
                if !regex.is_match(trimmed) {
                    errors.push(message.clone());
                }
            }

            for threat in scan_threats(raw) {
                errors.push(threat.message().to_string());
            }

            for rule in &rules.custom {
                if !rule.passes(trimmed) {
                    errors.push(rule.message().to_string());
                }
            }
        }

        let outcome = self.sanitizer.sanitize(raw);
        if outcome.error.is_some() {
            errors.push(SANITIZE_FAILURE_MESSAGE.to_string());
        }

        if !errors.is_empty() {
            debug!(error_count = errors.len(), "Input failed validation");
        }

        ValidationResult::from_errors(errors, outcome.value)
    }

    /// Edge boundary for untyped input: anything but a string is rejected
    pub fn validate_value(&self, value: &Value, rules: &ValidationRules) -> ValidationResult {
        match value {
            Value::String(raw) => self.validate_input(raw, rules),
            _ => ValidationResult::from_errors(
                vec!["Input must be a string".to_string()],
                String::new(),
            ),
        }
    }

    pub fn validate_email(&self, email: &str) -> ValidationResult {
        let rules = ValidationRules::new()
            .required()
            .max_length(EMAIL_MAX_LENGTH)
            .shared_pattern(&EMAIL_PATTERN, "Please enter a valid email address")
            .custom(has_valid_domain_segments, "Email domain is invalid");

        self.validate_input(email, &rules)
    }

    pub fn validate_password(&self, password: &str) -> ValidationResult {
        let rules = ValidationRules::new()
            .required()
            .min_length(PASSWORD_MIN_LENGTH)
            .max_length(PASSWORD_MAX_LENGTH)
            .custom(
                |p| p.chars().any(|c| c.is_uppercase()),
                "Password must contain an uppercase letter",
            )
            .custom(
                |p| p.chars().any(|c| c.is_lowercase()),
                "Password must contain a lowercase letter",
            )
            .custom(
                |p| p.chars().any(|c| c.is_ascii_digit()),
                "Password must contain a number",
            )
            .custom(
                |p| p.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
                "Password must contain a special character",
            )
            .custom(
                |p| !has_repeated_run(p, 3),
                "Password must not contain 3 or more repeated characters in a row",
            );

        self.validate_input(password, &rules)
    }

    pub fn validate_url(&self, url: &str) -> ValidationResult {
        let rules = ValidationRules::new()
            .required()
            .max_length(URL_MAX_LENGTH)
            .custom(|u| Url::parse(u).is_ok(), "Please enter a valid URL")
            .custom(
                |u| {
                    Url::parse(u)
                        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
                        .unwrap_or(true)
                },
                "Only HTTP and HTTPS URLs are allowed",
            )
            .custom(
                |u| {
                    Url::parse(u)
                        .map(|parsed| !is_blocked_host(&parsed))
                        .unwrap_or(true)
                },
                "URLs pointing to local or private networks are not allowed",
            );

        self.validate_input(url, &rules)
    }

    pub fn validate_name(&self, name: &str) -> ValidationResult {
        let rules = ValidationRules::new()
            .required()
            .min_length(NAME_MIN_LENGTH)
            .max_length(NAME_MAX_LENGTH)
            .shared_pattern(
                &NAME_PATTERN,
                "Name may only contain letters, spaces, apostrophes, and hyphens",
            );

        self.validate_input(name, &rules)
    }

    /// Validate named fields; a field without a value is validated as empty
    pub fn validate_form(
        &self,
        values: &BTreeMap<String, String>,
        rules: &BTreeMap<String, ValidationRules>,
    ) -> FormValidation {
        let fields: BTreeMap<String, ValidationResult> = rules
            .iter()
            .map(|(field, field_rules)| {
                let raw = values.get(field).map(String::as_str).unwrap_or("");
                (field.clone(), self.validate_input(raw, field_rules))
            })
            .collect();

        FormValidation {
            is_valid: fields.values().all(|result| result.is_valid),
            fields,
        }
    }
}

pub fn validate_input(raw: &str, rules: &ValidationRules) -> ValidationResult {
    Validator::default().validate_input(raw, rules)
}

pub fn validate_email(email: &str) -> ValidationResult {
    Validator::default().validate_email(email)
}

pub fn validate_password(password: &str) -> ValidationResult {
    Validator::default().validate_password(password)
}

pub fn validate_url(url: &str) -> ValidationResult {
    Validator::default().validate_url(url)
}

pub fn validate_name(name: &str) -> ValidationResult {
    Validator::default().validate_name(name)
}

/// Reject empty, leading-dot, or trailing-dot segments in the email domain
fn has_valid_domain_segments(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.split('.').all(|segment| {
                    !segment.is_empty() && !segment.starts_with('-') && !segment.ends_with('-')
                })
        }
        None => false,
    }
}

fn has_repeated_run(value: &str, run: usize) -> bool {
    let mut previous = None;
    let mut count = 0;

    for c in value.chars() {
        if Some(c) == previous {
            count += 1;
        } else {
            previous = Some(c);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }

    false
}

fn is_blocked_host(url: &Url) -> bool {
    let host = match url.host() {
        Some(host) => host,
        None => return false,
    };

    let literal = match host {
        Host::Domain(domain) => domain.to_ascii_lowercase(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => format!("[{}]", addr),
    };

    if BLOCKED_HOST_PREFIXES
        .iter()
        .any(|prefix| literal.starts_with(prefix))
    {
        return true;
    }

    // 172.16.0.0/12
    if let Host::Ipv4(addr) = host {
        let octets = addr.octets();
        return octets[0] == 172 && (16..=31).contains(&octets[1]);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_empty() {
        let result = validate_input("   ", &ValidationRules::new().required());
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["This field is required"]);
        assert_eq!(result.sanitized_value, "");
    }

    #[test]
    fn test_optional_empty_is_valid() {
        let result = validate_input("", &ValidationRules::new().min_length(3));
        assert!(result.is_valid);
    }

    #[test]
    fn test_length_bounds() {
        let rules = ValidationRules::new().min_length(3).max_length(5);
        assert_eq!(
            validate_input("ab", &rules).errors,
            vec!["Must be at least 3 characters"]
        );
        assert_eq!(
            validate_input("abcdef", &rules).errors,
            vec!["Must be no more than 5 characters"]
        );
        assert!(validate_input("abcd", &rules).is_valid);
    }

    #[test]
    fn test_global_cap_applies_without_rules() {
        let validator = Validator::new(10);
        let result = validator.validate_input("a".repeat(11).as_str(), &ValidationRules::new());
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec!["Input exceeds maximum allowed length of 10 characters"]
        );
        assert_eq!(result.sanitized_value.len(), 10);
    }

    #[test]
    fn test_custom_predicate_message() {
        let rules = ValidationRules::new().custom(|v| v.starts_with('x'), "Must start with x");
        assert_eq!(validate_input("abc", &rules).errors, vec!["Must start with x"]);
        assert!(validate_input("xyz", &rules).is_valid);
    }

    #[test]
    fn test_non_string_rejected() {
        let validator = Validator::default();
        let result = validator.validate_value(&serde_json::json!(42), &ValidationRules::new());
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Input must be a string"]);
        assert_eq!(result.sanitized_value, "");

        let result = validator.validate_value(&serde_json::json!("ok"), &ValidationRules::new());
        assert!(result.is_valid);
    }

    #[test]
    fn test_multiple_threats_each_report() {
        let result = validate_input(
            "<script>x</script> ../../etc",
            &ValidationRules::new(),
        );
        assert!(!result.is_valid);
        assert!(result
            .errors
            .contains(&"Input contains potentially malicious script content".to_string()));
        assert!(result
            .errors
            .contains(&"Input contains path traversal sequences".to_string()));
        assert_eq!(result.sanitized_value, "../../etc");
    }

    #[test]
    fn test_sanitizer_failure_is_reported() {
        let raw = format!("{}x{}", "<i>".repeat(80), "</i>".repeat(80));
        let result = validate_input(&raw, &ValidationRules::new());
        assert!(result.errors.contains(&SANITIZE_FAILURE_MESSAGE.to_string()));
        assert_eq!(result.sanitized_value, "x");
    }

    #[test]
    fn test_domain_segments() {
        assert!(has_valid_domain_segments("user@example.com"));
        assert!(!has_valid_domain_segments("a@b..com"));
        assert!(!has_valid_domain_segments("a@.b.com"));
        assert!(!has_valid_domain_segments("a@b.com."));
        assert!(!has_valid_domain_segments("no-at-sign"));
    }

    #[test]
    fn test_repeated_run() {
        assert!(has_repeated_run("aaa", 3));
        assert!(has_repeated_run("xx!!!y", 3));
        assert!(!has_repeated_run("aabbcc", 3));
        assert!(!has_repeated_run("", 3));
    }

    #[test]
    fn test_blocked_hosts() {
        let blocked = [
            "http://localhost:3000",
            "http://127.0.0.1/",
            "http://10.1.2.3/",
            "http://192.168.1.1/",
            "http://172.20.0.1/",
            "http://169.254.169.254/latest",
            "http://[::1]/",
            "http://[fd00::1]/",
        ];
        for url in blocked {
            assert!(is_blocked_host(&Url::parse(url).unwrap()), "{url}");
        }

        assert!(!is_blocked_host(&Url::parse("https://172.32.0.1/").unwrap()));
        assert!(!is_blocked_host(&Url::parse("https://example.com/").unwrap()));
    }
}
