//! Price normalization.
//!
//! Accepts currency-symbol amounts (`$19.99`, `19,99 €`), ISO code amounts
//! (`CAD 12.99`, `12.99 USD`), lead phrasing (`Now $49.99`, `From $10`) and
//! ranges (`$50 – $70` gives the lower bound). Text with a URL-like fragment
//! is never a price.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const SYMBOL: &str = r"(?:US|C|CA|A|AU|NZ|MX|R)?\$|[€£¥₹]";
const CODE: &str = r"USD|CAD|AUD|NZD|MXN|EUR|GBP|JPY|INR";
const AMOUNT: &str = r"\d{1,3}(?:[.,]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?";

static URL_GUARD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://|www\.|/[\w-]+/[\w-]+|\.(?:html?|php|aspx?)\b").expect("valid regex")
});

static LEAD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:now|sale|from|as low as|starting at|only)\b\s*:?").expect("valid regex")
});

static RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)({SYMBOL})\s*({AMOUNT})\s*(?:-|–|—|to)\s*(?:{SYMBOL})?\s*({AMOUNT})"
    ))
    .expect("valid regex")
});

static SYMBOL_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)({SYMBOL})\s*({AMOUNT})")).expect("valid regex"));

static CODE_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b({CODE})\s*({AMOUNT})")).expect("valid regex"));

static CODE_SUFFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)({AMOUNT})\s*({CODE})\b")).expect("valid regex"));

static SYMBOL_SUFFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"({AMOUNT})\s*({SYMBOL})")).expect("valid regex"));

static CODE_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b(?:{CODE})\b")).expect("valid regex"));

static BARE_AMOUNT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\s*({AMOUNT})\s*$")).expect("valid regex"));

/// Normalize visible price text to `<symbol><amount>`.
pub fn normalize_price(text: &str) -> Option<String> {
    if text.trim().is_empty() || URL_GUARD_REGEX.is_match(text) {
        return None;
    }
    if let Some(lead) = LEAD_REGEX.find(text) {
        if let Some(price) = parse_amount(&text[lead.end()..]) {
            return Some(price);
        }
    }
    parse_amount(text)
}

/// Like [`normalize_price`], but also accepts a bare number such as a
/// `content="19.99"` attribute, read as dollars.
pub fn normalize_price_loose(text: &str) -> Option<String> {
    normalize_price(text).or_else(|| format_structured_price(text, None))
}

/// Format a structured-data amount with its ISO currency code.
pub fn format_structured_price(amount: &str, currency: Option<&str>) -> Option<String> {
    if URL_GUARD_REGEX.is_match(amount) {
        return None;
    }
    let caps = BARE_AMOUNT_REGEX.captures(amount)?;
    let value = caps.get(1)?.as_str();
    match currency.map(str::trim).filter(|c| !c.is_empty()) {
        None => Some(format!("${value}")),
        Some(code) => match symbol_for_code(code) {
            Some(symbol) => Some(format!("{symbol}{value}")),
            None => Some(format!("{value} {}", code.to_ascii_uppercase())),
        },
    }
}

/// Whether text carries both a digit and a currency token.
pub fn has_currency_token(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && (text.contains(['$', '€', '£', '¥', '₹']) || CODE_TOKEN_REGEX.is_match(text))
}

fn parse_amount(text: &str) -> Option<String> {
    if let Some(caps) = RANGE_REGEX.captures(text) {
        let symbol = symbol_of(&caps, 1)?;
        let (low, high) = (caps.get(2)?.as_str(), caps.get(3)?.as_str());
        let lower = if numeric(high) < numeric(low) { high } else { low };
        return Some(format!("{symbol}{lower}"));
    }
    if let Some(caps) = SYMBOL_PREFIX_REGEX.captures(text) {
        return Some(format!("{}{}", symbol_of(&caps, 1)?, caps.get(2)?.as_str()));
    }
    if let Some(caps) = CODE_PREFIX_REGEX.captures(text) {
        let symbol = symbol_for_code(caps.get(1)?.as_str())?;
        return Some(format!("{symbol}{}", caps.get(2)?.as_str()));
    }
    if let Some(caps) = CODE_SUFFIX_REGEX.captures(text) {
        let symbol = symbol_for_code(caps.get(2)?.as_str())?;
        return Some(format!("{symbol}{}", caps.get(1)?.as_str()));
    }
    if let Some(caps) = SYMBOL_SUFFIX_REGEX.captures(text) {
        return Some(format!("{}{}", symbol_of(&caps, 2)?, caps.get(1)?.as_str()));
    }
    None
}

/// Canonical symbol of a captured symbol group; every dollar variant is `$`.
fn symbol_of(caps: &Captures, group: usize) -> Option<&'static str> {
    let raw = caps.get(group)?.as_str();
    match raw.chars().last()? {
        '$' => Some("$"),
        '€' => Some("€"),
        '£' => Some("£"),
        '¥' => Some("¥"),
        '₹' => Some("₹"),
        _ => None,
    }
}

fn symbol_for_code(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "USD" | "CAD" | "AUD" | "NZD" | "MXN" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

/// Numeric value for comparing range bounds.
fn numeric(amount: &str) -> f64 {
    let decimal_comma = amount
        .rfind(',')
        .map(|i| amount.len() - i <= 3 && !amount.contains('.'))
        .unwrap_or(false);
    let cleaned: String = if decimal_comma {
        amount.replace('.', "").replace(',', ".")
    } else {
        amount.replace(',', "")
    };
    cleaned.parse().unwrap_or(f64::MAX)
}
