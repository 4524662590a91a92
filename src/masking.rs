use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};

const REDACTED: &str = "[REDACTED]";

/// Render a secret for diagnostics, unless `show_secrets` is set.
pub fn redact(secret: &SecretString, show_secrets: bool) -> String {
    if show_secrets {
        secret.expose_secret().to_string()
    } else {
        REDACTED.to_string()
    }
}

pub fn redact_optional(secret: Option<&SecretString>, show_secrets: bool) -> String {
    match secret {
        Some(s) => redact(s, show_secrets),
        None => "(not set)".to_string(),
    }
}

/// Render a URL with any embedded password replaced.
pub fn redact_url(url: &Url, show_secrets: bool) -> String {
    if show_secrets || url.password().is_none() {
        return url.to_string();
    }
    let mut masked = url.clone();
    // Only fails for URLs that cannot carry credentials, which have no password to hide.
    let _ = masked.set_password(Some(REDACTED));
    masked.to_string()
}
