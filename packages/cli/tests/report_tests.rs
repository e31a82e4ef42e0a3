// ABOUTME: Tests for the CLI's header masking and validation reports
// ABOUTME: Runs the real validators so reports match what the UI would show

use campus_cli::{mask_header_value, validation_report, ValidationKind};
use campus_security::Validator;
use rstest::rstest;

#[rstest]
#[case("Bearer at_0123456789abcdef", "Bearer at_0")]
#[case("csrf-token-abcdefghijkl", "csrf")]
fn header_values_are_masked(#[case] value: &str, #[case] visible_prefix: &str) {
    let masked = mask_header_value(value);

    assert!(masked.starts_with(visible_prefix), "{masked}");
    assert!(!masked.contains("abcdef"), "{masked}");
}

#[test]
fn short_header_values_are_fully_hidden() {
    assert_eq!(mask_header_value("Bearer short"), "Bearer ****");
    assert_eq!(mask_header_value("tiny"), "****");
}

#[rstest]
#[case(ValidationKind::Url, "http://localhost:8080", false)]
#[case(ValidationKind::Url, "https://example.com", true)]
#[case(ValidationKind::Name, "Ada Lovelace", true)]
#[case(ValidationKind::Text, "<script>alert(1)</script>", false)]
fn report_reflects_validity(#[case] kind: ValidationKind, #[case] value: &str, #[case] valid: bool) {
    let result = kind.validate(&Validator::default(), value);
    let report = validation_report(kind, &result);

    let expected = if valid { "valid" } else { "invalid" };
    assert_eq!(report.lines().next(), Some(format!("{:?}: {}", kind, expected).as_str()));
}
