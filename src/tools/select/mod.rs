//! Select Tools
//!
//! Every selector string reaching the engine comes from heuristics, persisted
//! profiles or configuration, so evaluation returns a typed error instead of
//! panicking and callers skip the bad selector.

mod tests;
mod utils;

pub use utils::{is_stable_id, is_unstable_class, specificity};

use crate::types::CandidateSelector;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// A selector string that `scraper` refused to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// Parse a selector, keeping the offending string in the error.
pub fn parse(selector: &str) -> Result<Selector, SelectorError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(SelectorError {
            selector: selector.to_string(),
            reason: "empty selector".into(),
        });
    }
    Selector::parse(trimmed).map_err(|e| SelectorError {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// All descendants of `scope` matching `selector`, in document order.
pub fn select_all<'a>(
    scope: ElementRef<'a>,
    selector: &str,
) -> Result<Vec<ElementRef<'a>>, SelectorError> {
    let sel = parse(selector)?;
    let found = scope.select(&sel).collect();
    Ok(found)
}

/// All elements of `doc` matching `selector`, in document order.
pub fn select_doc<'a>(doc: &'a Html, selector: &str) -> Result<Vec<ElementRef<'a>>, SelectorError> {
    let sel = parse(selector)?;
    let found = doc.select(&sel).collect();
    Ok(found)
}

/// Class tokens as written in the `class` attribute. `scraper`'s own
/// `classes()` comes back sorted, which loses source order.
pub fn class_tokens<'a>(el: &'a scraper::node::Element) -> impl Iterator<Item = &'a str> + 'a {
    el.attr("class").unwrap_or_default().split_whitespace()
}

/// Selector for one element: a stable `id` when it has one, else the tag plus
/// up to two non-generated class tokens.
pub fn derive_selector(el: &ElementRef) -> String {
    if let Some(id) = el.value().id() {
        if is_stable_id(id) {
            return format!("#{id}");
        }
    }
    derive_shape(el)
}

/// Tag plus up to two stable classes, ignoring `id`. Repeated cards share it.
pub fn derive_shape(el: &ElementRef) -> String {
    let tag = el.value().name();
    let classes = utils::stable_classes(el, 2);
    if classes.is_empty() {
        tag.to_string()
    } else {
        format!("{tag}.{}", classes.join("."))
    }
}

/// Strip generated class fragments and collapse whitespace.
///
/// Returns `None` when a compound loses everything it had (a selector made
/// only of hashed classes), or when the result no longer parses.
pub fn normalize_selector(selector: &str) -> Option<String> {
    let parts: Vec<&str> = selector.split_whitespace().collect();
    if parts.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        if matches!(part, ">" | "+" | "~") {
            out.push(part.to_string());
            continue;
        }
        let stripped = utils::strip_unstable_classes(part);
        if stripped.is_empty() {
            return None;
        }
        out.push(stripped);
    }
    let normalized = out.join(" ");
    parse(&normalized).ok().map(|_| normalized)
}

/// Record a candidate, keeping the maximum score seen for duplicates.
pub fn push_candidate(candidates: &mut Vec<CandidateSelector>, selector: String, score: f64) {
    match candidates.iter_mut().find(|c| c.selector == selector) {
        Some(existing) => {
            if score > existing.score {
                existing.score = score;
            }
        }
        None => candidates.push(CandidateSelector { selector, score }),
    }
}

/// Sort candidates best-first: score, then specificity, then insertion order.
pub fn rank_candidates(candidates: &mut [CandidateSelector]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| specificity(&b.selector).cmp(&specificity(&a.selector)))
    });
}
