use crate::patterns::{is_detail_href, CHROME_TOKEN_REGEX, GRID_TOKEN_REGEX};
use crate::types::ExtractedItem;
use regex::Regex;
use scraper::ElementRef;

/// Items scoring below this are dropped before post-processing.
pub(super) const MIN_PREFILTER_SCORE: i32 = 1;

/// Titles longer than this are page copy, not a product name.
const MAX_TITLE_CHARS: usize = 200;

const CHROME_TAGS: &[&str] = &["header", "footer", "nav"];

/// Strict cascade-level quality score of one raw item.
pub(super) fn prefilter_score(card: ElementRef, item: &ExtractedItem) -> i32 {
    let mut score = 0;
    if item.href.as_deref().map(is_detail_href).unwrap_or(false) {
        score += 3;
    }
    if has_marked_ancestor(card, &GRID_TOKEN_REGEX, &[]) {
        score += 2;
    }
    if item.image.is_some() && item.title.is_some() {
        score += 1;
    }
    if item.price.is_some() || item.sale_price.is_some() {
        score += 1;
    }
    if has_marked_ancestor(card, &CHROME_TOKEN_REGEX, CHROME_TAGS) {
        score -= 2;
    }
    match &item.title {
        Some(title) if title.chars().count() <= MAX_TITLE_CHARS => {}
        _ => score -= 1,
    }
    if item.href.is_none() {
        score -= 1;
    }
    score
}

/// Whether the card or an ancestor below `<body>` carries a class/id token
/// matching `pattern`, or one of `tags`.
fn has_marked_ancestor(card: ElementRef, pattern: &Regex, tags: &[&str]) -> bool {
    std::iter::once(card)
        .chain(card.ancestors().filter_map(ElementRef::wrap))
        .take_while(|el| !matches!(el.value().name(), "body" | "html"))
        .any(|el| {
            let v = el.value();
            tags.contains(&v.name()) || v.classes().chain(v.id()).any(|t| pattern.is_match(t))
        })
}
