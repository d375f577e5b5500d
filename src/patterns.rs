//! Shared Patterns

use once_cell::sync::Lazy;
use regex::Regex;

/// Hrefs that point at a single product.
pub static PRODUCT_HREF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        /(?:products?|product-detail|p|dp|item|items|sku|goods|catalog/product)/[^/?\#]+
        | [?&](?:pid|sku|product_id|productid|variant|item_id)=
        | /[a-z0-9-]*-\d{3,}(?:\.html?)?(?:$|[?\#])
        ",
    )
    .expect("valid regex")
});

/// Last path segment made of three or more hyphenated words.
static SLUG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9]+(?:-[a-z0-9]+){2,}(?:\.html?)?$").expect("valid regex"));

/// Path segment that reads like a SKU: alphanumeric with a digit.
static SKU_SEGMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9]+(?:[-_][a-z0-9]+)*$").expect("valid regex"));

/// First path segments of pages that are not product detail pages.
const NON_DETAIL_SEGMENTS: &[&str] = &[
    "blog", "news", "about", "help", "account", "cart", "checkout", "login", "register",
    "category", "categories", "collections", "c", "search", "pages", "contact", "stores",
];

/// Class/id words of chrome regions around a listing.
pub static CHROME_TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:site-|page-|global-|main-)?(?:header|footer|nav|navbar|navigation|breadcrumbs?|hero|carousel|slider|menu|mega-menu|masthead)(?:$|[-_])",
    )
    .expect("valid regex")
});

/// Class/id words of listing grids.
pub static GRID_TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|[-_])(?:grid|products|product-list|product-grid|results|search-results|listing|collection|catalog|plp)(?:$|[-_])",
    )
    .expect("valid regex")
});

/// Filter and facet panels.
pub static FILTER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)filter|facet|refine|sort-?by").expect("valid regex"));

/// Sidebars and narrow columns.
pub static SIDEBAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)sidebar|side-bar|aside|left-?col|col-?left|column-left|col-(?:xs|sm|md|lg)-[1-3]\b")
        .expect("valid regex")
});

/// Calls to action that are never a description.
pub static CTA_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:add to (?:cart|bag|basket)|buy now|shop now|view (?:details|product)|quick ?(?:view|shop)|learn more|sold out|choose options|select options|read more|compare)\b",
    )
    .expect("valid regex")
});

/// Whether `href` points at a single product.
pub fn is_product_href(href: &str) -> bool {
    PRODUCT_HREF_REGEX.is_match(href)
}

/// Whether `href` looks like a genuine detail page rather than navigation.
pub fn is_detail_href(href: &str) -> bool {
    if is_product_href(href) {
        return true;
    }
    let path = path_of(href);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => {
            !NON_DETAIL_SEGMENTS.contains(&first.to_ascii_lowercase().as_str())
                && SLUG_REGEX.is_match(last)
        }
        _ => false,
    }
}

/// Whether some path segment of `href` reads like a SKU.
pub fn has_sku_segment(href: &str) -> bool {
    path_of(href).split('/').any(|seg| {
        seg.len() >= 4
            && seg.len() <= 40
            && seg.chars().any(|c| c.is_ascii_digit())
            && SKU_SEGMENT_REGEX.is_match(seg)
    })
}

/// Path part of an absolute or relative href.
fn path_of(href: &str) -> &str {
    let no_scheme = match href.find("://") {
        Some(idx) => {
            let rest = &href[idx + 3..];
            rest.find('/').map(|p| &rest[p..]).unwrap_or("")
        }
        None => href,
    };
    no_scheme.split(['?', '#']).next().unwrap_or(no_scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_hrefs() {
        assert!(is_product_href("/products/red-shirt"));
        assert!(is_product_href("https://shop.example.com/p/12345"));
        assert!(is_product_href("/shop?pid=42"));
        assert!(is_product_href("/blue-widget-12345.html"));
        assert!(!is_product_href("/collections/shirts"));
        assert!(!is_product_href("/about"));
    }

    #[test]
    fn test_detail_hrefs() {
        assert!(is_detail_href("/shop/blue-cotton-shirt"));
        assert!(!is_detail_href("/blog/how-to-style-shirts"));
        assert!(!is_detail_href("/cart"));
        assert!(is_detail_href("/products/x"));
    }

    #[test]
    fn test_sku_segments() {
        assert!(has_sku_segment("/products/abc-123"));
        assert!(has_sku_segment("https://example.com/item/SKU9981?ref=x"));
        assert!(!has_sku_segment("/products/red-shirt"));
    }

    #[test]
    fn test_chrome_and_grid_tokens() {
        assert!(CHROME_TOKEN_REGEX.is_match("site-header"));
        assert!(CHROME_TOKEN_REGEX.is_match("breadcrumbs"));
        assert!(!CHROME_TOKEN_REGEX.is_match("product-card"));
        assert!(GRID_TOKEN_REGEX.is_match("product-grid"));
        assert!(GRID_TOKEN_REGEX.is_match("search-results"));
        assert!(!GRID_TOKEN_REGEX.is_match("product-card"));
    }
}
