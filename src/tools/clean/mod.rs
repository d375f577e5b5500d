//! Clean Tools


use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Clean text read from a card or a JSON-LD value.
///
/// Decodes HTML entities, normalizes to NFC, drops zero-width and control
/// characters, then collapses whitespace.
///
/// # Examples
/// ```
/// use listwise::tools::clean::clean;
///
/// assert_eq!(clean("  Ben &amp; Jerry&#39;s\u{200B}   Pint "), "Ben & Jerry's Pint");
/// ```
pub fn clean(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let visible: String = decoded
        .nfc()
        .filter(|c| !matches!(*c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    WHITESPACE_REGEX.replace_all(&visible, " ").trim().to_string()
}

/// Clean text, mapping an empty result to `None`.
pub fn clean_opt(text: &str) -> Option<String> {
    let cleaned = clean(text);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Keep at most `max` characters, on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}
