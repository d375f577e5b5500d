use super::price::{normalize_price, normalize_price_loose};
use super::resolvers::{self, PageContext};
use crate::tools::clean::clean_opt;
use crate::tools::select::select_all;
use crate::types::{ExtractedItem, FieldMode, FieldRule, FieldRules};
use scraper::ElementRef;
use tracing::debug;

/// Attribute read order for attribute-style fields.
const ATTRIBUTE_PRIORITY: &[&str] = &["href", "src", "data-src", "data-srcset", "content"];

/// Matches of one selector inspected before moving to the next selector.
const MAX_TARGETS: usize = 3;

/// Fields read as text or markup, never from attributes.
fn is_text_field(field: &str) -> bool {
    matches!(field, "title" | "description")
}

/// Whether `attr` may hold a value for `field`.
fn attribute_fits(field: &str, attr: &str) -> bool {
    match field {
        "href" => matches!(attr, "href" | "content"),
        "image" => matches!(attr, "src" | "data-src" | "data-srcset" | "content"),
        "price" | "salePrice" | "sale_price" | "compareAt" | "compare_at" => attr == "content",
        _ => true,
    }
}

/// Read one field from a card with its rule's selectors, in order. An empty
/// selector reads the card itself. Invalid selectors are skipped.
pub fn read_field(card: ElementRef, field: &str, rule: &FieldRule) -> Option<String> {
    for sel in &rule.selectors {
        let targets = if sel.trim().is_empty() {
            vec![card]
        } else {
            match select_all(card, sel) {
                Ok(found) => found,
                Err(e) => {
                    debug!(field, error = %e, "skipping field selector");
                    continue;
                }
            }
        };
        let value = targets
            .into_iter()
            .take(MAX_TARGETS)
            .find_map(|target| read_value(target, field, rule));
        if value.is_some() {
            return value;
        }
    }
    None
}

fn read_value(target: ElementRef, field: &str, rule: &FieldRule) -> Option<String> {
    if is_text_field(field) {
        return match rule.mode {
            FieldMode::Html => Some(target.inner_html().trim().to_string()).filter(|h| !h.is_empty()),
            FieldMode::Text => clean_opt(&target.text().collect::<String>()),
        };
    }

    let explicit = rule.attribute.as_deref().into_iter();
    let ordered = ATTRIBUTE_PRIORITY
        .iter()
        .copied()
        .filter(|attr| attribute_fits(field, attr));
    for attr in explicit.chain(ordered) {
        if let Some(raw) = target.value().attr(attr) {
            if let Some(value) = accept_attribute(field, attr, raw) {
                return Some(value);
            }
        }
    }

    match field {
        "href" | "image" => None,
        _ => accept_text(field, &target.text().collect::<String>()),
    }
}

fn accept_attribute(field: &str, attr: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match field {
        "href" => accept_href(raw),
        "image" => {
            let url = if attr.ends_with("srcset") {
                first_srcset_url(raw)?
            } else {
                raw.to_string()
            };
            accept_image(&url)
        }
        "price" | "salePrice" | "sale_price" | "compareAt" | "compare_at" => {
            normalize_price_loose(raw)
        }
        _ => clean_opt(raw),
    }
}

fn accept_text(field: &str, text: &str) -> Option<String> {
    match field {
        "price" | "salePrice" | "sale_price" | "compareAt" | "compare_at" => normalize_price(text),
        _ => clean_opt(text),
    }
}

pub(super) fn accept_href(raw: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    if raw.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }
    Some(raw.to_string())
}

pub(super) fn accept_image(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() || url.to_ascii_lowercase().starts_with("data:") {
        return None;
    }
    Some(url.to_string())
}

/// First URL of a `srcset`-style list.
pub(super) fn first_srcset_url(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

/// Build one item from a card: rule-driven fast path first, then the deep
/// resolver chains for anything still missing.
pub(super) fn read_item(card: ElementRef, rules: &FieldRules, page: &PageContext) -> ExtractedItem {
    let mut item = ExtractedItem::default();
    for (name, rule) in rules {
        let Some(value) = read_field(card, name, rule) else {
            continue;
        };
        match name.as_str() {
            "title" => item.title = Some(value),
            "href" => item.href = Some(value),
            "price" => item.price = Some(value),
            "salePrice" | "sale_price" => item.sale_price = Some(value),
            "compareAt" | "compare_at" => item.compare_at = Some(value),
            "image" => item.image = Some(value),
            "description" => item.description = Some(value),
            _ => {
                item.extra.insert(name.clone(), value);
            }
        }
    }

    if item.href.is_none() {
        item.href = resolvers::resolve(resolvers::HREF_CHAIN, card, &item, page);
    }
    if item.title.is_none() {
        item.title = resolvers::resolve(resolvers::TITLE_CHAIN, card, &item, page);
    }
    if item.image.is_none() {
        item.image = resolvers::resolve(resolvers::IMAGE_CHAIN, card, &item, page);
    }
    if item.price.is_none() && item.sale_price.is_none() {
        item.price = resolvers::resolve(resolvers::PRICE_CHAIN, card, &item, page);
    }
    if item.description.is_none() {
        item.description = resolvers::resolve(resolvers::DESCRIPTION_CHAIN, card, &item, page);
    }
    if let Some(image) = &item.image {
        item.images = vec![image.clone()];
    }
    item
}
