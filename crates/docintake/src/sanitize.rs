//! Helpers for sanitizing data before it enters tracing spans or ids.
//!
//! Filenames are user supplied. Hashes are shortened so that log lines stay
//! readable and never carry full content fingerprints.

use std::path::Path;

/// Maximum length of a sanitized filename used inside correlation ids.
const MAX_SANITIZED_LEN: usize = 64;

/// Returns only the final filename component (no directories).
pub fn redact_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces a filename to `[A-Za-z0-9._-]`, collapsing everything else to `_`.
///
/// The result is never empty and at most 64 characters.
pub fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let mut out = String::with_capacity(base.len());
    let mut last_was_sep = false;

    for c in base.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    let trimmed: String = out
        .trim_matches('_')
        .chars()
        .take(MAX_SANITIZED_LEN)
        .collect();

    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed
    }
}

/// First 12 hex characters of a fingerprint, for logs.
pub fn short_hash(fingerprint: &str) -> &str {
    let end = fingerprint
        .char_indices()
        .nth(12)
        .map(|(i, _)| i)
        .unwrap_or(fingerprint.len());
    &fingerprint[..end]
}
