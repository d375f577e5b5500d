use super::default_field_rules;
use crate::patterns::{is_product_href, FILTER_REGEX, SIDEBAR_REGEX};
use crate::selectors::{HEADING_SELECTOR, ITEMTYPE_SELECTOR, LINK_SELECTOR};
use crate::tools::select::{derive_selector, derive_shape, push_candidate, select_doc};
use crate::types::{CandidateSelector, FieldRule, MiningResult, MiningSource};
use scraper::{ElementRef, Html};
use std::collections::HashSet;

/// Microdata products needed before the page counts as a microdata listing.
const MICRODATA_MIN_PRODUCTS: usize = 6;

/// Scopes swept in order; elements already visited are skipped.
const ROOT_SCOPES: &[&str] = &["main", "[role='main']", "#content", "#main", ".content", "body"];

/// Tags that can hold a listing grid.
const CONTAINER_TAGS: &[&str] = &["div", "ul", "ol", "section", "table", "tbody", "article", "form"];

/// Containers scored per page.
const MAX_CONTAINERS: usize = 600;

/// Minimum container score before it contributes candidates.
const MIN_CONTAINER_SCORE: f64 = 4.0;

/// Repeated children needed to call a container a grid of cards.
const MIN_CARDS: usize = 3;

/// Class and id fragments that mark an item inside a listing.
const ITEM_MARKERS: &[&str] = &["product", "item", "card", "tile", "price", "sku"];

/* ---------------- microdata ---------------- */

/// Detect `[itemtype*=schema.org/Product]` cards and their common ancestor.
pub(super) fn mine_microdata(doc: &Html) -> Option<MiningResult> {
    let products: Vec<ElementRef> = doc
        .select(&ITEMTYPE_SELECTOR)
        .filter(|el| {
            el.value()
                .attr("itemtype")
                .map(|t| t.to_ascii_lowercase().contains("schema.org/product"))
                .unwrap_or(false)
        })
        .collect();
    if products.len() < MICRODATA_MIN_PRODUCTS {
        return None;
    }

    let paths: Vec<Vec<_>> = products
        .iter()
        .map(|el| {
            let mut path: Vec<_> = el.ancestors().map(|n| n.id()).collect();
            path.reverse();
            path.push(el.id());
            path
        })
        .collect();
    let depth = common_prefix_len(&paths);
    if depth == 0 {
        return None;
    }
    let ancestor = doc
        .tree
        .get(paths[0][depth - 1])
        .and_then(ElementRef::wrap)?;
    let container = qualified_selector(&ancestor);

    let mut candidates = Vec::new();
    if let Some(card) = paths[0]
        .get(depth)
        .and_then(|id| doc.tree.get(*id))
        .and_then(ElementRef::wrap)
    {
        push_candidate(
            &mut candidates,
            format!("{container} > {}", derive_shape(&card)),
            90.0,
        );
    }
    push_candidate(
        &mut candidates,
        "[itemtype*='schema.org/Product']".into(),
        80.0,
    );
    push_candidate(&mut candidates, format!("{container} a[href]"), 60.0);

    let mut fields = default_field_rules();
    fields.insert(
        "title".into(),
        FieldRule::new(["[itemprop='name']", "h2", "h3", "h4", "a[href]"]),
    );
    fields.insert(
        "href".into(),
        FieldRule::new(["[itemprop='url']", "", "a[href]"]),
    );
    fields.insert(
        "price".into(),
        FieldRule::new(["[itemprop='price']", "[itemprop='offers']", ".price"]),
    );
    fields.insert(
        "image".into(),
        FieldRule::new(["[itemprop='image']", "img"]),
    );

    Some(MiningResult {
        primary_selector: None,
        candidates,
        fields,
        confidence: 0.85,
        source: MiningSource::Microdata,
        containers: vec![container],
    })
}

/// Length of the prefix shared by every root-to-node path.
fn common_prefix_len<T: PartialEq>(paths: &[Vec<T>]) -> usize {
    let Some(first) = paths.first() else {
        return 0;
    };
    let mut len = first.len();
    for path in &paths[1..] {
        len = len.min(
            first
                .iter()
                .zip(path.iter())
                .take_while(|(a, b)| a == b)
                .count(),
        );
    }
    len
}

/* ---------------- dom sweep ---------------- */

/// Score every plausible container and derive card and link selectors from
/// the ones that look like a product grid.
pub(super) fn mine_dom(doc: &Html) -> Option<MiningResult> {
    let mut candidates: Vec<CandidateSelector> = Vec::new();
    let mut containers: Vec<String> = Vec::new();
    let mut visited = HashSet::new();
    let mut best = 0.0f64;

    for scope_sel in ROOT_SCOPES {
        let Ok(scopes) = select_doc(doc, scope_sel) else {
            continue;
        };
        let Some(scope) = scopes.first() else {
            continue;
        };
        for el in scope.descendants().filter_map(ElementRef::wrap) {
            if visited.len() >= MAX_CONTAINERS {
                break;
            }
            if !is_container(&el) || !visited.insert(el.id()) {
                continue;
            }
            let score = score_container(&el);
            if score <= MIN_CONTAINER_SCORE {
                continue;
            }
            let sel = qualified_selector(&el);
            push_candidate(&mut candidates, format!("{sel} a[href]"), score * 2.0);
            if let Some(card) = card_shape(&el) {
                push_candidate(&mut candidates, format!("{sel} > {card}"), score * 3.0);
                best = best.max(score * 3.0);
            } else {
                best = best.max(score * 2.0);
            }
            if !containers.contains(&sel) {
                containers.push(sel);
            }
        }
    }

    if candidates.is_empty() {
        return None;
    }
    Some(MiningResult {
        primary_selector: None,
        candidates,
        fields: default_field_rules(),
        confidence: (best / (best + 60.0)).min(0.95),
        source: MiningSource::DomSweep,
        containers,
    })
}

fn is_container(el: &ElementRef) -> bool {
    CONTAINER_TAGS.contains(&el.value().name())
        && el.children().filter_map(ElementRef::wrap).nth(1).is_some()
}

/// Listing likelihood of a container.
pub(super) fn score_container(el: &ElementRef) -> f64 {
    let product_links = el
        .select(&LINK_SELECTOR)
        .filter(|a| a.value().attr("href").map(is_product_href).unwrap_or(false))
        .count();
    let markers = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|d| has_item_marker(d))
        .count();
    let images = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|d| d.value().name() == "img")
        .count();
    let headings = el.select(&HEADING_SELECTOR).count();

    let label = identity_text(el);
    let filter_penalty = if FILTER_REGEX.is_match(&label) { 6.0 } else { 0.0 };
    let sidebar_penalty = if el.value().name() == "aside" || SIDEBAR_REGEX.is_match(&label) {
        4.0
    } else {
        0.0
    };

    3.0 * product_links as f64
        + 2.0 * markers.min(10) as f64
        + images.min(12) as f64
        + headings.min(6) as f64
        - filter_penalty
        - sidebar_penalty
}

fn has_item_marker(el: &ElementRef) -> bool {
    let v = el.value();
    if v.attr("itemprop").is_some()
        || v.attr("itemtype").is_some()
        || v.attr("data-product-id").is_some()
        || v.attr("data-sku").is_some()
    {
        return true;
    }
    v.classes().chain(v.id()).any(|token| {
        let lower = token.to_ascii_lowercase();
        ITEM_MARKERS.iter().any(|m| lower.contains(m))
    })
}

/// Class, id, role and aria-label of an element joined for pattern checks.
fn identity_text(el: &ElementRef) -> String {
    let v = el.value();
    let mut parts: Vec<&str> = v.classes().collect();
    parts.extend(v.id());
    parts.extend(v.attr("role"));
    parts.extend(v.attr("aria-label"));
    parts.join(" ")
}

/// Most common child shape when it repeats and mostly carries links.
pub(super) fn card_shape(el: &ElementRef) -> Option<String> {
    let children: Vec<ElementRef> = el.children().filter_map(ElementRef::wrap).collect();
    let mut groups: Vec<(String, usize, usize)> = Vec::new();
    for child in &children {
        let shape = derive_shape(child);
        let linked = usize::from(
            child.value().name() == "a" || child.select(&LINK_SELECTOR).next().is_some(),
        );
        match groups.iter_mut().find(|(s, _, _)| *s == shape) {
            Some(group) => {
                group.1 += 1;
                group.2 += linked;
            }
            None => groups.push((shape, 1, linked)),
        }
    }
    let mut best: Option<(String, usize, usize)> = None;
    for group in groups {
        if best.as_ref().map(|b| group.1 > b.1).unwrap_or(true) {
            best = Some(group);
        }
    }
    best.filter(|(_, count, linked)| *count >= MIN_CARDS && linked * 2 >= *count)
        .map(|(shape, _, _)| shape)
}

/// Selector for `el`, qualified by its parent when it is a bare tag.
pub(super) fn qualified_selector(el: &ElementRef) -> String {
    let own = derive_selector(el);
    if own.contains(['.', '#']) {
        return own;
    }
    match el.parent().and_then(ElementRef::wrap) {
        Some(parent) if parent.value().name() != "html" => {
            let up = derive_selector(&parent);
            if up.contains(['.', '#']) {
                format!("{up} > {own}")
            } else {
                own
            }
        }
        _ => own,
    }
}
