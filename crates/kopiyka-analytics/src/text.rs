//! Merchant-label normalization shared by trends, anomalies and what-if.

use once_cell::sync::Lazy;
use regex::Regex;

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TAIL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\s*[#№]\s*\w+|\s+\d{3,}|\s+[a-f0-9]{6,})\s*$").unwrap());
static STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s'&+\-\.]").unwrap());

const LABEL_MAX_LEN: usize = 48;
pub const UNKNOWN_LABEL: &str = "unknown";

/// Lowercase, strip trailing terminal/receipt identifiers and punctuation,
/// collapse whitespace, bound to 48 chars. Empty input becomes "unknown".
pub fn normalize_merchant(description: &str) -> String {
    let s = description.trim().to_lowercase();
    if s.is_empty() {
        return UNKNOWN_LABEL.to_string();
    }
    let s = TAIL_ID_RE.replace(&s, "");
    let s = STRIP_RE.replace_all(&s, " ");
    let s = WS_RE.replace_all(&s, " ");
    let s = s.trim();
    if s.is_empty() {
        return UNKNOWN_LABEL.to_string();
    }
    s.chars().take(LABEL_MAX_LEN).collect()
}

/// Looser normalization for keyword matching: lowercase, punctuation to
/// spaces, collapsed whitespace.
pub fn normalize_loose(text: &str) -> String {
    let s = text.trim().to_lowercase();
    let s = STRIP_RE.replace_all(&s, " ");
    WS_RE.replace_all(&s, " ").trim().to_string()
}
