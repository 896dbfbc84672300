//! Query-text normalization.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase, punctuation to spaces, collapsed whitespace.
pub fn norm(s: &str) -> String {
    let t = s.trim().to_lowercase().replace('_', " ");
    let t = NON_WORD_RE.replace_all(&t, " ");
    WS_RE.replace_all(&t, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_strips_punctuation_and_case() {
        assert_eq!(norm("  МАК!! "), "мак");
        assert_eq!(norm("McDonald's  Kyiv"), "mcdonald s kyiv");
        assert_eq!(norm("a_b__c"), "a b c");
        assert_eq!(norm(""), "");
    }
}
