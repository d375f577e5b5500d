use super::price::{format_structured_price, normalize_price_loose};
use crate::selectors::JSONLD_SELECTOR;
use crate::tools::clean::clean_opt;
use crate::types::ExtractedItem;
use scraper::Html;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// How deep to look for `Product` / `ItemList` nodes inside other objects.
const MAX_DEPTH: usize = 6;

/// Parse every JSON-LD block; malformed blocks are skipped one by one.
pub(super) fn parse_blocks(doc: &Html) -> Vec<Value> {
    doc.select(&JSONLD_SELECTOR)
        .filter_map(|el| {
            let raw = el.text().collect::<String>();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(error = %e, "skipping malformed json-ld block");
                    None
                }
            }
        })
        .flat_map(flatten_graph)
        .collect()
}

/// Unwrap top-level arrays and `@graph` containers.
fn flatten_graph(value: Value) -> Vec<Value> {
    match value {
        Value::Array(arr) => arr.into_iter().flat_map(flatten_graph).collect(),
        Value::Object(mut obj) => {
            if let Some(Value::Array(arr)) = obj.remove("@graph") {
                return arr.into_iter().flat_map(flatten_graph).collect();
            }
            vec![Value::Object(obj)]
        }
        _ => Vec::new(),
    }
}

fn has_type(value: &Value, wanted: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => type_matches(t, wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| type_matches(t, wanted)),
        _ => false,
    }
}

fn type_matches(declared: &str, wanted: &str) -> bool {
    declared
        .rsplit(['/', ':'])
        .next()
        .map(|t| t.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Items from `Product`, `ItemList` and `ListItem` nodes. A `Product` is
/// emitted whole; its nested offers and variants are not walked.
pub(super) fn structured_items(blocks: &[Value]) -> Vec<ExtractedItem> {
    let mut items = Vec::new();
    for block in blocks {
        collect_items(block, 0, &mut items);
    }
    items
}

fn collect_items(value: &Value, depth: usize, out: &mut Vec<ExtractedItem>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Array(arr) => arr.iter().for_each(|v| collect_items(v, depth + 1, out)),
        Value::Object(obj) => {
            if has_type(value, "Product") || has_type(value, "ProductGroup") {
                if let Some(item) = product_item(value) {
                    out.push(item);
                }
                return;
            }
            if has_type(value, "ItemList") {
                if let Some(elements) = obj.get("itemListElement") {
                    list_elements(elements, depth, out);
                }
                return;
            }
            for nested in obj.values() {
                if nested.is_object() || nested.is_array() {
                    collect_items(nested, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

fn list_elements(elements: &Value, depth: usize, out: &mut Vec<ExtractedItem>) {
    let entries: Vec<&Value> = match elements {
        Value::Array(arr) => arr.iter().collect(),
        other => vec![other],
    };
    for entry in entries {
        if !has_type(entry, "ListItem") {
            collect_items(entry, depth + 1, out);
            continue;
        }
        match entry.get("item") {
            Some(inner @ Value::Object(_)) if has_type(inner, "Product") => {
                collect_items(inner, depth + 1, out)
            }
            Some(inner @ Value::Object(_)) => {
                if let Some(item) = product_item(inner).or_else(|| product_item(entry)) {
                    out.push(item);
                }
            }
            Some(Value::String(url)) => out.push(ExtractedItem {
                href: Some(url.clone()),
                title: string_field(entry, "name"),
                ..ExtractedItem::default()
            }),
            _ => {
                if let Some(item) = product_item(entry) {
                    out.push(item);
                }
            }
        }
    }
}

/// One item from a product-like object; `None` when it has neither a name
/// nor a URL.
fn product_item(value: &Value) -> Option<ExtractedItem> {
    let title = string_field(value, "name");
    let href = string_field(value, "url").or_else(|| {
        string_field(value, "@id").filter(|id| id.starts_with("http") || id.starts_with('/'))
    });
    if title.is_none() && href.is_none() {
        return None;
    }
    let images = image_urls(value.get("image"));
    Some(ExtractedItem {
        title,
        href,
        price: offer_price(value),
        image: images.first().cloned(),
        images,
        description: string_field(value, "description"),
        ..ExtractedItem::default()
    })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => clean_opt(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn image_urls(value: Option<&Value>) -> Vec<String> {
    let urls: Vec<String> = match value {
        Some(Value::String(s)) => vec![s.trim().to_string()],
        Some(Value::Array(arr)) => arr.iter().flat_map(|v| image_urls(Some(v))).collect(),
        Some(obj @ Value::Object(_)) => string_field(obj, "url")
            .or_else(|| string_field(obj, "contentUrl"))
            .into_iter()
            .collect(),
        _ => Vec::new(),
    };
    urls.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Price of the first offer that carries one.
fn offer_price(value: &Value) -> Option<String> {
    let offers: Vec<&Value> = match value.get("offers") {
        Some(Value::Array(arr)) => arr.iter().collect(),
        Some(offer @ Value::Object(_)) => vec![offer],
        _ => vec![value],
    };
    offers.into_iter().find_map(|offer| {
        let currency = string_field(offer, "priceCurrency");
        ["price", "lowPrice", "highPrice"]
            .iter()
            .find_map(|key| string_field(offer, key))
            .or_else(|| {
                offer
                    .get("priceSpecification")
                    .and_then(|spec| string_field(spec, "price"))
            })
            .and_then(|amount| {
                format_structured_price(&amount, currency.as_deref())
                    .or_else(|| normalize_price_loose(&amount))
            })
    })
}

/* ---------------- price index ---------------- */

/// Structured-data prices keyed by URL path and lowercased name.
#[derive(Debug, Default)]
pub(super) struct PriceIndex {
    by_path: HashMap<String, String>,
    by_name: HashMap<String, String>,
    single: Option<String>,
}

impl PriceIndex {
    pub fn build(items: &[ExtractedItem]) -> Self {
        let mut index = PriceIndex::default();
        for item in items {
            let Some(price) = &item.price else {
                continue;
            };
            if let Some(href) = &item.href {
                index.by_path.entry(path_key(href)).or_insert_with(|| price.clone());
            }
            if let Some(title) = &item.title {
                index
                    .by_name
                    .entry(title.to_lowercase())
                    .or_insert_with(|| price.clone());
            }
        }
        if items.len() == 1 {
            index.single = items[0].price.clone();
        }
        index
    }

    /// Price for a card by its link, then its title, then the page's only
    /// product.
    pub fn lookup(&self, href: Option<&str>, title: Option<&str>) -> Option<String> {
        href.and_then(|h| self.by_path.get(&path_key(h)))
            .or_else(|| title.and_then(|t| self.by_name.get(&t.to_lowercase())))
            .or(self.single.as_ref())
            .cloned()
    }
}

/// Host-free, slash-trimmed path used to match relative and absolute links.
fn path_key(href: &str) -> String {
    let rest = match href.find("://") {
        Some(idx) => {
            let after = &href[idx + 3..];
            after.find('/').map(|p| &after[p..]).unwrap_or("/")
        }
        None => href,
    };
    let path = rest.split(['?', '#']).next().unwrap_or(rest);
    path.trim_end_matches('/').to_lowercase()
}
