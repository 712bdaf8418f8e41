//! Credential handling and redaction
//!
//! Credentials travel through the engine wrapped in [`SecretString`], whose
//! `Debug` and `Display` output never reveals the value. Anything that leaves
//! the engine as diagnostics (raw payloads in the attempt log, request
//! descriptions in logs) is passed through the helpers below first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder written wherever a secret value used to be
pub const REDACTED: &str = "[REDACTED]";

/// Maximum number of characters of a raw payload kept for diagnostics
pub const DEFAULT_PAYLOAD_BUDGET: usize = 2048;

/// A wrapper type for sensitive strings like API keys
#[derive(Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    /// Create a new secret string
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the actual value (use with caution)
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    /// Check if the secret is empty
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Get a partially redacted version for debugging
    pub fn partial_redact(&self) -> String {
        if self.value.is_empty() {
            return "[EMPTY]".to_string();
        }

        let chars: Vec<char> = self.value.chars().collect();
        let len = chars.len();
        if len <= 8 {
            REDACTED.to_string()
        } else if self.value.starts_with("sk-") || self.value.starts_with("gsk_") {
            let prefix: String = chars[..3].iter().collect();
            let suffix: String = chars[len - 4..].iter().collect();
            format!("{}...{}", prefix, suffix)
        } else {
            let prefix: String = chars[..2].iter().collect();
            let suffix: String = chars[len - 2..].iter().collect();
            format!("{}...{}", prefix, suffix)
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", REDACTED)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

const SENSITIVE_NAME_PATTERNS: [&str; 9] = [
    "api_key",
    "api-key",
    "apikey",
    "app_key",
    "secret",
    "token",
    "password",
    "credential",
    "auth",
];

/// Whether a header, query parameter or field name looks like it carries a secret
pub fn is_sensitive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "key"
        || lower.ends_with("-key")
        || SENSITIVE_NAME_PATTERNS
            .iter()
            .any(|pattern| lower.contains(pattern))
}

/// Redact a value based on the name it is stored under
pub fn redact_by_field_name(field_name: &str, value: &str) -> String {
    if is_sensitive_name(field_name) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// Prepare a raw provider payload for inclusion in an attempt record.
///
/// Every occurrence of a known credential value is replaced by [`REDACTED`],
/// then the text is truncated to `budget` characters. Compound credentials
/// such as Adzuna's `app_id:app_key` are also redacted part by part, since
/// the parts travel separately. Values shorter than four characters are
/// ignored; replacing them would mangle ordinary text.
pub fn redact_payload(payload: &str, secrets: &[SecretString], budget: usize) -> String {
    let mut values: Vec<&str> = secrets
        .iter()
        .map(SecretString::expose_secret)
        .flat_map(|value| std::iter::once(value).chain(value.split(':')))
        .map(str::trim)
        .filter(|value| value.len() >= 4)
        .collect();
    // whole values before their parts
    values.sort_by_key(|value| std::cmp::Reverse(value.len()));
    values.dedup();

    let mut redacted = payload.to_string();
    for value in values {
        if redacted.contains(value) {
            redacted = redacted.replace(value, REDACTED);
        }
    }

    truncate_chars(&redacted, budget)
}

/// Truncate on a character boundary, marking the cut
pub fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}...[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
