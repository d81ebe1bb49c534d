//! Label sanitization
//!
//! Turns whatever the classifier returned into a bounded, filesystem-safe
//! base name. Alphanumerics are Unicode-aware (`char::is_alphanumeric`), so
//! German labels like `Rückzahlung` survive intact.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Fallback label when nothing usable remains
pub const UNKNOWN_LABEL: &str = "UNKNOWN_DOC";

/// Maximum sanitized length in characters (before suffix and extension)
pub const MAX_LABEL_CHARS: usize = 70;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static UNDERSCORES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid underscore regex"));

/// Sanitize a raw classifier label into a safe base filename
///
/// Always returns a non-empty string of alphanumerics, hyphens and single
/// underscores, at most [`MAX_LABEL_CHARS`] characters long. Applying it to
/// its own output is a no-op.
pub fn sanitize_label(raw: &str) -> String {
    let normalized: String = raw.nfc().collect();

    // Markup first, so a trailing "<div>" never becomes part of a line
    let without_tags = TAG_RE.replace_all(&normalized, "");

    let first_line = without_tags.trim().lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return UNKNOWN_LABEL.to_string();
    }

    let underscored = WHITESPACE_RE.replace_all(first_line, "_");

    // Dropping characters can leave a composable pair behind, so compose again
    let filtered: String = underscored
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .nfc()
        .collect();

    let collapsed = UNDERSCORES_RE.replace_all(&filtered, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        return UNKNOWN_LABEL.to_string();
    }

    let truncated: String = trimmed.chars().take(MAX_LABEL_CHARS).collect();
    truncated.trim_end_matches('_').to_string()
}
