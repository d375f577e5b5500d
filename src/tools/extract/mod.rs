//! Extract Tools
//!
//! The extraction cascade: walk the selector buckets in a fixed order, stop
//! at the first strategy whose items survive the pre-filter, and fall back
//! to embedded structured data when no bucket matches.

mod cards;
mod fields;
mod jsonld;
mod price;
mod resolvers;
pub mod types;
mod utils;

pub use fields::read_field;
pub use price::{has_currency_token, normalize_price, normalize_price_loose};
pub use types::*;

use crate::config::COMBINED_SELECTOR_LIMIT;
use crate::dedupe;
use crate::services::store::normalize_buckets;
use crate::tools::post::collapse_duplicates;
use crate::tools::select::{parse, select_doc};
use crate::types::{BucketKind, Buckets, ExtractedItem, FieldRules};
use jsonld::PriceIndex;
use resolvers::PageContext;
use scraper::{ElementRef, Html};
use tracing::debug;

/// Run the cascade and return only the surviving items.
pub fn extract(html: &str, buckets: &Buckets, fields: &FieldRules) -> Vec<ExtractedItem> {
    extract_with(html, buckets, fields, usize::MAX).items
}

/// Run the cascade, reporting which strategy produced the items.
pub fn extract_with(
    html: &str,
    buckets: &Buckets,
    fields: &FieldRules,
    max_cards: usize,
) -> CascadeOutcome {
    let doc = Html::parse_document(html);
    extract_doc(&doc, buckets, fields, max_cards)
}

pub fn extract_doc(
    doc: &Html,
    buckets: &Buckets,
    fields: &FieldRules,
    max_cards: usize,
) -> CascadeOutcome {
    let blocks = jsonld::parse_blocks(doc);
    let structured = jsonld::structured_items(&blocks);
    let page = PageContext::new(doc, PriceIndex::build(&structured));

    for bucket in BucketKind::ORDER {
        let selectors = buckets.get(bucket);
        if selectors.is_empty() {
            continue;
        }
        for selector in selectors {
            let nodes = match select_doc(doc, selector) {
                Ok(nodes) => nodes,
                Err(e) => {
                    debug!(bucket = bucket.name(), error = %e, "skipping selector");
                    continue;
                }
            };
            let items = run_strategy(&nodes, buckets, fields, &page, max_cards);
            if !items.is_empty() {
                debug!(bucket = bucket.name(), selector, items = items.len(), "cascade hit");
                return CascadeOutcome {
                    items,
                    strategy: Strategy::Selector {
                        bucket,
                        selector: selector.clone(),
                    },
                };
            }
        }

        let valid: Vec<String> = selectors
            .iter()
            .filter(|s| parse(s).is_ok())
            .take(COMBINED_SELECTOR_LIMIT)
            .cloned()
            .collect();
        if valid.len() < 2 {
            continue;
        }
        if let Ok(nodes) = select_doc(doc, &valid.join(", ")) {
            let items = run_strategy(&nodes, buckets, fields, &page, max_cards);
            if !items.is_empty() {
                debug!(bucket = bucket.name(), items = items.len(), "combined cascade hit");
                return CascadeOutcome {
                    items,
                    strategy: Strategy::Combined {
                        bucket,
                        selectors: valid,
                    },
                };
            }
        }
    }

    let items = collapse_duplicates(structured.into_iter().filter(|item| {
        item.title.is_some() || item.href.is_some()
    }).collect());
    if items.is_empty() {
        debug!("cascade found nothing");
        CascadeOutcome::empty()
    } else {
        debug!(items = items.len(), "structured data fallback");
        CascadeOutcome {
            items,
            strategy: Strategy::StructuredData,
        }
    }
}

/// Cards of one strategy, read, scored, filtered and collapsed.
fn run_strategy(
    nodes: &[ElementRef],
    buckets: &Buckets,
    fields: &FieldRules,
    page: &PageContext,
    max_cards: usize,
) -> Vec<ExtractedItem> {
    if nodes.is_empty() {
        return Vec::new();
    }
    let cards = cards::resolve_cards(nodes, &buckets.containers, &buckets.candidates, max_cards);
    let scored: Vec<ExtractedItem> = cards
        .into_iter()
        .map(|card| {
            let mut item = fields::read_item(card, fields, page);
            item.score = utils::prefilter_score(card, &item);
            item
        })
        .filter(|item| item.score >= utils::MIN_PREFILTER_SCORE)
        .collect();
    collapse_duplicates(scored)
}

/// Concatenate bucket layers in precedence order, then dedupe and cap.
pub fn compose_buckets(layers: &[&Buckets]) -> Buckets {
    let mut out = Buckets::default();
    for kind in BucketKind::ORDER {
        let joined: Vec<String> = layers.iter().flat_map(|b| b.get(kind).iter().cloned()).collect();
        *out.get_mut(kind) = dedupe!(joined);
    }
    normalize_buckets(&out)
}

/// Overlay field rule maps; later layers win per field.
pub fn compose_fields(layers: &[&FieldRules]) -> FieldRules {
    let mut out = FieldRules::new();
    for layer in layers {
        for (name, rule) in layer.iter() {
            out.insert(name.clone(), rule.clone());
        }
    }
    out
}
