//! Post Tools
//!
//! Canonicalize, collapse, score and sort raw items.

mod utils;

pub use utils::canonicalize_href;

use crate::tools::extract::has_currency_token;
use crate::patterns::has_sku_segment;
use crate::types::ExtractedItem;
use std::cmp::Ordering;
use url::Url;

/// Final pipeline stage over the cascade's items.
pub fn post_process(items: Vec<ExtractedItem>, base_url: &str) -> Vec<ExtractedItem> {
    let base = Url::parse(base_url).ok();
    let scored: Vec<ExtractedItem> = items
        .into_iter()
        .map(|item| {
            let mut item = utils::canonicalize_item(item, base.as_ref());
            item.score = rank_score(&item);
            item
        })
        .collect();
    let mut unique = collapse_duplicates(scored);
    unique.sort_by(compare_items);
    unique
}

/// Ranking score of a canonical item.
pub fn rank_score(item: &ExtractedItem) -> i32 {
    let mut score = 0;
    if let Some(title) = &item.title {
        score += 2;
        if title.chars().count() >= 20 {
            score += 1;
        }
    }
    if let Some(href) = &item.href {
        score += 2;
        if has_sku_segment(href) {
            score += 1;
        }
    }
    if let Some(price) = &item.price {
        score += 2;
        if has_currency_token(price) {
            score += 1;
        }
    }
    if item.image.is_some() {
        score += 1;
    }
    if item.description.as_deref().map(|d| d.chars().count() > 10).unwrap_or(false) {
        score += 1;
    }
    score
}

/// Identity of an item: its href when it has one, else its title.
///
/// Linked items ignore the title: one product often appears twice on a page
/// with different wording (teaser and card), and `href¦title` keeps both.
pub fn dedup_key(item: &ExtractedItem) -> String {
    match &item.href {
        Some(href) => format!("{href}¦"),
        None => format!("¦{}", item.title.as_deref().unwrap_or_default()),
    }
}

/// Collapse items sharing a [`dedup_key`], keeping the higher score and,
/// on a tie, the more populated record. First-seen position is kept.
pub fn collapse_duplicates(items: Vec<ExtractedItem>) -> Vec<ExtractedItem> {
    let mut out: Vec<ExtractedItem> = Vec::with_capacity(items.len());
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for item in items {
        let key = dedup_key(&item);
        match index.get(&key) {
            Some(&pos) => {
                let kept = &out[pos];
                let better = item.score > kept.score
                    || (item.score == kept.score && item.populated() > kept.populated());
                if better {
                    out[pos] = item;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(item);
            }
        }
    }
    out
}

/// Score descending, then title, then href.
fn compare_items(a: &ExtractedItem, b: &ExtractedItem) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.title.as_deref().unwrap_or("").cmp(b.title.as_deref().unwrap_or("")))
        .then_with(|| a.href.as_deref().unwrap_or("").cmp(b.href.as_deref().unwrap_or("")))
}
