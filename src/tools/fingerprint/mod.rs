//! Fingerprint Tools
//!
//! A coarse structural signature of a document, used as a fuzzy cache key
//! when matching learned profiles. Collisions are expected and harmless.

mod tests;

use crate::tools::select::class_tokens;
use crate::selectors::{BODY_SELECTOR, JSONLD_SELECTOR, LINK_SELECTOR, MAIN_SELECTOR};
use scraper::{Html, Selector};
use once_cell::sync::Lazy;

/// Class/id words that mark repeated item blocks.
const CARD_VOCABULARY: &[&str] = &["card", "tile", "result", "entry", "product", "item", "grid__item"];

static DIV_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div").expect("valid div selector"));

/// Fingerprint raw HTML.
pub fn fingerprint(html: &str) -> String {
    let doc = Html::parse_document(html);
    fingerprint_doc(&doc)
}

/// Fingerprint a parsed document:
/// `c{cards}-d{anchor density}-da{data attrs}-ld{0|1}-{top classes}`.
pub fn fingerprint_doc(doc: &Html) -> String {
    let mut cards = 0usize;
    let mut data_attrs = 0usize;
    for el in doc.root_element().descendants().filter_map(scraper::ElementRef::wrap) {
        let value = el.value();
        data_attrs += value.attrs().filter(|(k, _)| k.starts_with("data-")).count();
        let hit = value
            .classes()
            .chain(value.id())
            .any(|token| is_card_token(token));
        if hit {
            cards += 1;
        }
    }

    let anchors = doc.select(&LINK_SELECTOR).count();
    let divs = doc.select(&DIV_SELECTOR).count();
    let density = ((1000.0 * anchors as f64) / divs.max(1) as f64).round() as u64;
    let has_ld = doc.select(&JSONLD_SELECTOR).next().is_some();

    format!(
        "c{cards}-d{density}-da{data_attrs}-ld{}-{}",
        u8::from(has_ld),
        top_signature(doc)
    )
}

/// The count-free tail of a fingerprint (`ld{0|1}-{top classes}`). It stays
/// put when a listing gains or loses items, so profile ids derive from it.
pub fn template_family(fingerprint: &str) -> &str {
    match fingerprint.splitn(4, '-').nth(3) {
        Some(tail) if tail.starts_with("ld") => tail,
        _ => fingerprint,
    }
}

fn is_card_token(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    CARD_VOCABULARY.iter().any(|word| lower.contains(word))
}

/// First two class tokens of `<main>`, else `<body>`; `0` when there are none.
fn top_signature(doc: &Html) -> String {
    let outer = doc
        .select(&MAIN_SELECTOR)
        .next()
        .or_else(|| doc.select(&BODY_SELECTOR).next());
    let tokens: Vec<String> = outer
        .map(|el| {
            class_tokens(el.value())
                .take(2)
                .map(|c| {
                    c.chars()
                        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
                        .take(24)
                        .collect::<String>()
                        .to_ascii_lowercase()
                })
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if tokens.is_empty() {
        "0".to_string()
    } else {
        tokens.join(".")
    }
}
