use crate::tools::clean::{clean_opt, truncate_chars};
use crate::types::ExtractedItem;
use url::Url;

const MAX_DESCRIPTION_CHARS: usize = 500;

/// Description strings that carry no information.
const BOILERPLATE_DESCRIPTIONS: &[&str] = &[
    "add to cart",
    "add to bag",
    "quick view",
    "quick shop",
    "sold out",
    "choose options",
    "select options",
    "view details",
    "read more",
    "description",
    "no description available",
    "no description",
];

pub(super) fn canonicalize_item(mut item: ExtractedItem, base: Option<&Url>) -> ExtractedItem {
    item.href = item.href.and_then(|h| canonicalize_href(&h, base));
    item.images = item
        .images
        .iter()
        .filter_map(|src| resolve(src, base))
        .collect();
    item.image = item
        .image
        .as_deref()
        .and_then(|src| resolve(src, base))
        .or_else(|| item.images.first().cloned());
    let price = [&item.sale_price, &item.price, &item.compare_at]
        .into_iter()
        .flatten()
        .find(|p| p.chars().any(|c| c.is_ascii_digit()))
        .cloned();
    item.price = price;
    item.title = item.title.as_deref().and_then(clean_opt);
    item.description = item
        .description
        .as_deref()
        .and_then(clean_opt)
        .filter(|d| !is_boilerplate(d))
        .map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS));
    item
}

fn is_boilerplate(description: &str) -> bool {
    let lower = description
        .trim_end_matches(['.', '!', ':', '…'])
        .trim()
        .to_lowercase();
    BOILERPLATE_DESCRIPTIONS.contains(&lower.as_str())
}

/// Absolute URL for `src` when a base is known; other values pass through.
fn resolve(src: &str, base: Option<&Url>) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(src).ok().map(|u| u.to_string()),
        None => Some(src.to_string()),
    }
}

/// Resolve against `base`, drop the fragment and `utm_*` parameters, and
/// strip trailing slashes.
pub fn canonicalize_href(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let parsed = match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    };
    let Some(mut url) = parsed else {
        let bare = href.split('#').next().unwrap_or(href);
        let trimmed = bare.trim_end_matches('/');
        return Some(if trimmed.is_empty() { "/" } else { trimmed }.to_string());
    };

    url.set_fragment(None);
    let has_utm = url.query_pairs().any(|(k, _)| k.starts_with("utm_"));
    if has_utm {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !k.starts_with("utm_"))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    let out = url.to_string();
    if url.path() == "/" && url.query().is_none() {
        return Some(out.trim_end_matches('/').to_string());
    }
    Some(out)
}
