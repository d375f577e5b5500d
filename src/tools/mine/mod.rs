//! Mine Tools
//!
//! Heuristic discovery of listing selectors on a page that has never been
//! seen before. Detectors run in priority order and the first one that
//! produces something wins: known platforms, schema.org microdata, a generic
//! DOM sweep, then a link-only fallback.

mod platforms;
mod siblings;
mod tests;
mod utils;

use crate::tools::select::rank_candidates;
use crate::types::{Buckets, CandidateSelector, FieldRule, FieldRules, MiningResult, MiningSource};
use scraper::Html;
use tracing::debug;

/// Mine listing selectors from raw HTML.
pub fn mine_candidates(html: &str, url: &str) -> MiningResult {
    let doc = Html::parse_document(html);
    mine_doc(&doc, html, url)
}

/// Mine from an already-parsed document. `html` is the raw source, used for
/// platform markers that live in scripts and asset URLs.
pub fn mine_doc(doc: &Html, html: &str, url: &str) -> MiningResult {
    let mut result = if let Some(platform) = platforms::detect(html, url) {
        platforms::mine(platform)
    } else if let Some(found) = utils::mine_microdata(doc) {
        found
    } else if let Some(found) = utils::mine_dom(doc) {
        found
    } else {
        fallback()
    };
    rank_candidates(&mut result.candidates);
    if result.primary_selector.is_none() {
        result.primary_selector = result.candidates.first().map(|c| c.selector.clone());
    }
    debug!(
        source = ?result.source,
        primary = ?result.primary_selector,
        candidates = result.candidates.len(),
        confidence = result.confidence,
        "mined candidates"
    );
    result
}

/// Cheap sibling-group pass used to enrich an update before it is merged.
/// Never fills the `list` bucket.
pub fn mine_light(html: &str) -> Buckets {
    let doc = Html::parse_document(html);
    siblings::mine_sibling_buckets(&doc)
}

impl MiningResult {
    /// Sort mined selectors into cascade buckets.
    pub fn to_buckets(&self) -> Buckets {
        let mut buckets = Buckets::default();
        if let Some(primary) = &self.primary_selector {
            buckets.list.push(primary.clone());
        }
        for cand in &self.candidates {
            let sel = &cand.selector;
            if sel.ends_with(" a[href]") {
                buckets.broad.push(sel.clone());
            } else if sel.starts_with("a[href") && sel != "a[href]" {
                buckets.anchors.push(sel.clone());
            }
            buckets.candidates.push(sel.clone());
        }
        buckets.containers = self.containers.clone();
        buckets
    }
}

/// Field rules that work on most hand-written card markup.
pub fn default_field_rules() -> FieldRules {
    let mut rules = FieldRules::new();
    rules.insert(
        "title".into(),
        FieldRule::new([
            "[itemprop='name']",
            ".product-title",
            ".product-name",
            ".product-card__title",
            ".card__heading",
            ".card-title",
            ".item-title",
            "h2",
            "h3",
            "h4",
            ".title",
            ".name",
        ]),
    );
    rules.insert("href".into(), FieldRule::new(["", "a[href]"]));
    rules.insert(
        "price".into(),
        FieldRule::new([
            "[itemprop='price']",
            ".price",
            ".product-price",
            ".price-item",
            "[data-price]",
        ]),
    );
    rules.insert("image".into(), FieldRule::new(["img", "source"]));
    rules.insert(
        "description".into(),
        FieldRule::new([
            "[itemprop='description']",
            ".description",
            ".product-description",
        ]),
    );
    rules
}

/// Last resort when nothing on the page looks like a listing.
fn fallback() -> MiningResult {
    MiningResult {
        primary_selector: None,
        candidates: vec![
            CandidateSelector {
                selector: "main a[href]".into(),
                score: 30.0,
            },
            CandidateSelector {
                selector: "a[href]".into(),
                score: 20.0,
            },
        ],
        fields: default_field_rules(),
        confidence: 0.1,
        source: MiningSource::Fallback,
        containers: Vec::new(),
    }
}
