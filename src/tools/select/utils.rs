use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

/// Plain CSS identifier we can emit without escaping.
static IDENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[_a-zA-Z][_a-zA-Z0-9-]*$").expect("valid regex"));

/// Prefixes used by CSS-in-JS and scoped-style tooling.
static GENERATED_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:css|sc|jsx|emotion|styled|svelte|tw|astro|vue|ng)-").expect("valid regex")
});

static DIGIT_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,}").expect("valid regex"));

/// Classes that flip with interaction state.
const STATE_CLASSES: &[&str] = &[
    "active", "selected", "hover", "focus", "focused", "open", "opened", "closed", "visible",
    "hidden", "show", "current", "disabled", "loaded", "lazyloaded", "lazyload", "animated",
];

const GENERATED_ID_PREFIXES: &[&str] = &["ember", "react-", "radix-", "headlessui-", "mui-", "yui_", "__"];

/// A segment of at least five characters mixing letters and digits.
fn is_hashed_segment(segment: &str) -> bool {
    segment.len() >= 5
        && segment.chars().any(|c| c.is_ascii_digit())
        && segment.chars().any(|c| c.is_ascii_alphabetic())
}

/// Class tokens that are generated, hashed, stateful or not emit-safe.
pub fn is_unstable_class(token: &str) -> bool {
    if !IDENT_REGEX.is_match(token) {
        return true;
    }
    let lower = token.to_ascii_lowercase();
    if STATE_CLASSES.contains(&lower.as_str())
        || lower.starts_with("is-")
        || lower.starts_with("has-")
        || lower.starts_with("js-")
    {
        return true;
    }
    if GENERATED_PREFIX_REGEX.is_match(&lower) {
        return true;
    }
    token.split(['-', '_']).any(is_hashed_segment)
}

/// Ids worth anchoring a selector on: short, hand-written, not numbered.
pub fn is_stable_id(id: &str) -> bool {
    if id.len() > 40 || !IDENT_REGEX.is_match(id) {
        return false;
    }
    let lower = id.to_ascii_lowercase();
    if GENERATED_ID_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return false;
    }
    !DIGIT_RUN_REGEX.is_match(id) && !id.split(['-', '_']).any(is_hashed_segment)
}

/// Specificity = 3 x classes + 4 x attribute predicates + descendant depth.
pub fn specificity(selector: &str) -> u32 {
    let mut classes = 0u32;
    let mut attrs = 0u32;
    let mut compounds = 0u32;
    let mut bracket = 0u32;
    let mut in_compound = false;
    for c in selector.trim().chars() {
        match c {
            '[' => {
                bracket += 1;
                attrs += 1;
            }
            ']' => bracket = bracket.saturating_sub(1),
            '.' if bracket == 0 => classes += 1,
            _ => {}
        }
        let separator = bracket == 0 && matches!(c, ' ' | '>' | '+' | '~');
        if separator {
            in_compound = false;
        } else if !in_compound {
            in_compound = true;
            compounds += 1;
        }
    }
    3 * classes + 4 * attrs + compounds.saturating_sub(1)
}

/// Up to `limit` stable class tokens of an element, in document order.
pub(super) fn stable_classes(el: &ElementRef, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(limit);
    for token in super::class_tokens(el.value()).filter(|c| !is_unstable_class(c)) {
        if out.len() == limit {
            break;
        }
        if !out.iter().any(|c| c == token) {
            out.push(token.to_string());
        }
    }
    out
}

/// Remove `.class` fragments that are unstable, outside attribute brackets.
pub(super) fn strip_unstable_classes(compound: &str) -> String {
    let chars: Vec<char> = compound.chars().collect();
    let mut out = String::with_capacity(compound.len());
    let mut bracket = 0u32;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '[' => {
                bracket += 1;
                out.push(c);
                i += 1;
            }
            ']' => {
                bracket = bracket.saturating_sub(1);
                out.push(c);
                i += 1;
            }
            '.' if bracket == 0 => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric() || chars[end] == '-' || chars[end] == '_')
                {
                    end += 1;
                }
                let token: String = chars[start..end].iter().collect();
                if !token.is_empty() && !is_unstable_class(&token) {
                    out.push('.');
                    out.push_str(&token);
                }
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}
