// ABOUTME: Allow-list HTML sanitizer and threat-signature scanner for free-text input
// ABOUTME: Cleans markup down to inline formatting tags and flags injection patterns

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::cell::Cell;
use thiserror::Error;
use tracing::{error, warn};

/// Inline formatting tags that survive sanitization (attributes are always dropped)
pub const ALLOWED_TAGS: &[&str] = &["b", "i", "em", "strong", "u", "br", "p"];

/// Elements removed together with everything inside them
pub const STRIPPED_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "embed"];

/// Deepest nesting of allowed elements the sanitizer accepts
pub const MAX_NESTING_DEPTH: usize = 64;

/// Global hard cap on input length, independent of per-field rules
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 10_000;

/// Error string reported when the sanitizer had to fall back to blunt stripping
pub const SANITIZE_FAILURE_MESSAGE: &str = "Input could not be fully sanitized";

const MAX_RESIDUAL_PASSES: usize = 8;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SanitizeError {
    #[error("markup nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    #[error("sanitizer patterns are unavailable")]
    PatternsUnavailable,
}

/// Kinds of hostile content the scanner recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreatKind {
    ScriptInjection,
    EventHandler,
    DangerousUri,
    SqlInjection,
    PathTraversal,
    NullByte,
}

impl ThreatKind {
    /// User-facing error string for this threat
    pub fn message(&self) -> &'static str {
        match self {
            ThreatKind::ScriptInjection => "Input contains potentially malicious script content",
            ThreatKind::EventHandler => "Input contains inline event handlers",
            ThreatKind::DangerousUri => "Input contains a disallowed URI scheme",
            ThreatKind::SqlInjection => "Input contains suspicious SQL sequences",
            ThreatKind::PathTraversal => "Input contains path traversal sequences",
            ThreatKind::NullByte => "Input contains null bytes",
        }
    }
}

static THREAT_SIGNATURES: Lazy<Vec<(ThreatKind, Regex)>> = Lazy::new(|| {
    let patterns: [(ThreatKind, &str); 5] = [
        (
            ThreatKind::ScriptInjection,
            r"(?i)<\s*/?\s*(?:script|iframe|object|embed|applet|style|link|meta|base|svg|form|img)\b|\bexpression\s*\(|\beval\s*\(|document\s*\.\s*(?:cookie|write)",
        ),
        (ThreatKind::EventHandler, r"(?i)\bon[a-z]+\s*="),
        (
            ThreatKind::DangerousUri,
            r"(?i)(?:java|vb|live)script\s*:|\bdata\s*:\s*text/html",
        ),
        (
            ThreatKind::SqlInjection,
            r"(?i)'\s*(?:or|and)\b|\bunion\s+(?:all\s+)?select\b|;\s*(?:drop|delete|insert|update|alter|truncate|exec)\b|\b(?:drop|truncate)\s+table\b|--|/\*|\*/|\bxp_\w+",
        ),
        (
            ThreatKind::PathTraversal,
            r"(?i)\.\.[/\\]|%2e%2e(?:%2f|%5c|/|\\)|\.\.%2f|\.\.%5c",
        ),
    ];

    patterns
        .iter()
        .filter_map(|(kind, pattern)| match Regex::new(pattern) {
            Ok(regex) => Some((*kind, regex)),
            Err(e) => {
                error!(?kind, error = %e, "Failed to compile threat signature");
                None
            }
        })
        .collect()
});

/// Report every threat kind present in `input`, in a stable order.
pub fn scan_threats(input: &str) -> Vec<ThreatKind> {
    let mut found: Vec<ThreatKind> = THREAT_SIGNATURES
        .iter()
        .filter(|(_, regex)| regex.is_match(input))
        .map(|(kind, _)| *kind)
        .collect();

    // Literal and percent-encoded null bytes
    if input.contains('\0') || input.to_ascii_lowercase().contains("%00") {
        found.push(ThreatKind::NullByte);
    }

    found
}

struct MarkupPatterns {
    comments: Regex,
    stripped_blocks: Regex,
    stripped_unclosed: Regex,
    declarations: Regex,
    tags: Regex,
    residual: Vec<Regex>,
}

fn compile_markup_patterns() -> Result<MarkupPatterns, regex::Error> {
    let stripped = STRIPPED_ELEMENTS.join("|");

    Ok(MarkupPatterns {
        comments: Regex::new(r"(?s)<!--.*?(?:-->|$)")?,
        stripped_blocks: Regex::new(&format!(
            r"(?is)<\s*(?:{stripped})\b[^>]*>.*?<\s*/\s*(?:{stripped})\s*>"
        ))?,
        stripped_unclosed: Regex::new(&format!(r"(?is)<\s*(?:{stripped})\b.*$"))?,
        declarations: Regex::new(r"(?s)<[!?][^>]*>")?,
        tags: Regex::new(r"(?s)<\s*(/)?\s*([a-zA-Z][a-zA-Z0-9:-]*)[^>]*>")?,
        residual: vec![
            Regex::new(r"(?i)(?:java|vb|live)script\s*:")?,
            Regex::new(r"(?i)\bdata\s*:\s*text/html")?,
            Regex::new(r"(?i)\bon[a-z]+\s*=")?,
            Regex::new(r"(?i)\bexpression\s*\(")?,
            Regex::new(r"(?i)eval\s*\(")?,
            Regex::new(r"(?i)document\s*\.\s*(?:cookie|write)")?,
            Regex::new(
                r"(?i)<\s*/?\s*(?:script|iframe|object|embed|applet|style|link|meta|base|svg|form|img)\b",
            )?,
        ],
    })
}

static MARKUP: Lazy<Option<MarkupPatterns>> = Lazy::new(|| match compile_markup_patterns() {
    Ok(patterns) => Some(patterns),
    Err(e) => {
        error!(error = %e, "Failed to compile sanitizer patterns");
        None
    }
});

/// Result of a sanitization pass
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeOutcome {
    pub value: String,
    /// Set when the blunt fallback was used
    pub error: Option<SanitizeError>,
}

/// Allow-list sanitizer with a length cap
#[derive(Debug, Clone)]
pub struct Sanitizer {
    max_input_length: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
        }
    }
}

impl Sanitizer {
    pub fn new(max_input_length: usize) -> Self {
        Self { max_input_length }
    }

    pub fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    /// Clean `raw` down to allowed inline markup.
    ///
    /// Never fails: when the markup cannot be processed safely the output is
    /// produced by stripping every tag and the outcome carries the error.
    pub fn sanitize(&self, raw: &str) -> SanitizeOutcome {
        let bounded: String = raw
            .chars()
            .take(self.max_input_length)
            .filter(|c| !c.is_control() || c.is_whitespace())
            .collect();

        match sanitize_markup(&bounded) {
            Ok(clean) => SanitizeOutcome {
                value: normalize_whitespace(&clean),
                error: None,
            },
            Err(e) => {
                warn!(audit = true, error = %e, "Sanitizer fell back to stripping all tags");
                let stripped = strip_all_tags(&bounded);
                let stripped = strip_residual(&stripped).unwrap_or(stripped);
                SanitizeOutcome {
                    value: normalize_whitespace(&stripped),
                    error: Some(e),
                }
            }
        }
    }
}

/// Sanitize with the default length cap, discarding any fallback error
pub fn sanitize_input(raw: &str) -> String {
    Sanitizer::default().sanitize(raw).value
}

fn sanitize_markup(input: &str) -> Result<String, SanitizeError> {
    let patterns = (*MARKUP).as_ref().ok_or(SanitizeError::PatternsUnavailable)?;

    let without_comments = patterns.comments.replace_all(input, "");
    let without_blocks = patterns.stripped_blocks.replace_all(&without_comments, "");
    let without_unclosed = patterns.stripped_unclosed.replace_all(&without_blocks, "");
    let without_declarations = patterns.declarations.replace_all(&without_unclosed, "");

    let depth = Cell::new(0usize);
    let deepest = Cell::new(0usize);

    let filtered = patterns
        .tags
        .replace_all(&without_declarations, |caps: &Captures| {
            let closing = caps.get(1).is_some();
            let name = caps
                .get(2)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();

            if !ALLOWED_TAGS.contains(&name.as_str()) {
                return String::new();
            }

            if name == "br" {
                return "<br>".to_string();
            }

            if closing {
                depth.set(depth.get().saturating_sub(1));
                format!("</{}>", name)
            } else {
                depth.set(depth.get() + 1);
                deepest.set(deepest.get().max(depth.get()));
                format!("<{}>", name)
            }
        });

    if deepest.get() > MAX_NESTING_DEPTH {
        return Err(SanitizeError::NestingTooDeep(MAX_NESTING_DEPTH));
    }

    strip_residual(&filtered)
}

/// Repeatedly remove residual dangerous fragments until the text is stable
fn strip_residual(input: &str) -> Result<String, SanitizeError> {
    let patterns = (*MARKUP).as_ref().ok_or(SanitizeError::PatternsUnavailable)?;

    let mut current = input.to_string();
    for _ in 0..MAX_RESIDUAL_PASSES {
        let mut next = current.clone();
        for regex in &patterns.residual {
            next = regex.replace_all(&next, "").into_owned();
        }
        if next == current {
            return Ok(current);
        }
        current = next;
    }

    Ok(current)
}

/// Blunt fallback: drop anything between angle brackets and any stray bracket
fn strip_all_tags(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut inside_tag = false;

    for c in input.chars() {
        match c {
            '<' => inside_tag = true,
            '>' => inside_tag = false,
            _ if !inside_tag => output.push(c),
            _ => {}
        }
    }

    output
}

fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_unchanged() {
        assert_eq!(sanitize_input("user@example.com"), "user@example.com");
        assert_eq!(sanitize_input("Tr0ub4dor&3xyz"), "Tr0ub4dor&3xyz");
    }

    #[test]
    fn test_allowed_tags_keep_no_attributes() {
        assert_eq!(
            sanitize_input(r#"<b class="x" onclick="evil()">bold</b> <EM>em</EM>"#),
            "<b>bold</b> <em>em</em>"
        );
        assert_eq!(sanitize_input("line<br/>break"), "line<br>break");
    }

    #[test]
    fn test_unknown_tags_are_dropped_but_text_kept() {
        assert_eq!(
            sanitize_input(r#"<a href="javascript:alert(1)">click</a>"#),
            "click"
        );
        assert_eq!(sanitize_input("<div><span>hi</span></div>"), "hi");
    }

    #[test]
    fn test_script_and_style_removed_with_content() {
        assert_eq!(
            sanitize_input("before<script>alert('x')</script>after"),
            "beforeafter"
        );
        assert_eq!(sanitize_input("<style>body{}</style>text"), "text");
        assert_eq!(sanitize_input("ok <SCRIPT src=x>never closed"), "ok");
    }

    #[test]
    fn test_residual_patterns_removed() {
        let output = sanitize_input("visit javascript:alert(1) now");
        assert!(!output.to_lowercase().contains("javascript:"));

        let output = sanitize_input("jajavascript:vascript:alert(1)");
        assert!(!output.to_lowercase().contains("javascript:"));
        assert_eq!(sanitize_input("eval(document.cookie)"), ")");
        assert_eq!(sanitize_input("say document.write('x') hi"), "say ('x') hi");
        assert_eq!(sanitize_input("evaeval(l(1)"), "1)");
    }

    #[test]
    fn test_whitespace_normalized_and_controls_removed() {
        assert_eq!(sanitize_input("  a \n\t b\0c  "), "a bc");
    }

    #[test]
    fn test_deep_nesting_falls_back_to_strip() {
        let raw = format!("{}deep{}", "<b>".repeat(70), "</b>".repeat(70));
        let outcome = Sanitizer::default().sanitize(&raw);

        assert_eq!(outcome.value, "deep");
        assert_eq!(
            outcome.error,
            Some(SanitizeError::NestingTooDeep(MAX_NESTING_DEPTH))
        );
    }

    #[test]
    fn test_input_truncated_to_cap() {
        let outcome = Sanitizer::new(5).sanitize("abcdefghij");
        assert_eq!(outcome.value, "abcde");
    }

    #[test]
    fn test_strip_all_tags() {
        assert_eq!(strip_all_tags("<p>a</p><x y='1'>b"), "ab");
    }

    #[test]
    fn test_scan_reports_each_threat() {
        let threats = scan_threats("<script>x</script> onclick=1 javascript: ' OR 1=1 ../etc\0");
        assert!(threats.contains(&ThreatKind::ScriptInjection));
        assert!(threats.contains(&ThreatKind::EventHandler));
        assert!(threats.contains(&ThreatKind::DangerousUri));
        assert!(threats.contains(&ThreatKind::SqlInjection));
        assert!(threats.contains(&ThreatKind::PathTraversal));
        assert!(threats.contains(&ThreatKind::NullByte));
    }

    #[test]
    fn test_scan_clean_input() {
        assert!(scan_threats("Hello, my name is Ada.").is_empty());
        assert!(scan_threats("user@example.com").is_empty());
    }

    #[test]
    fn test_encoded_traversal_and_null() {
        assert_eq!(
            scan_threats("%2e%2e%2fpasswd"),
            vec![ThreatKind::PathTraversal]
        );
        assert_eq!(scan_threats("file%00.txt"), vec![ThreatKind::NullByte]);
    }
}
