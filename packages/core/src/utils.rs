// ABOUTME: Shared utility functions for Campus
// ABOUTME: Secret masking for log and terminal output

/// Mask a secret for log output, keeping only its length and first characters
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    format!("{}…({} chars)", visible, secret.chars().count())
}
