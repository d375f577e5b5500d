use super::default_field_rules;
use crate::types::{CandidateSelector, FieldRule, MiningResult, MiningSource};
use once_cell::sync::Lazy;
use regex::Regex;

/// A storefront platform recognisable from its markup.
pub(super) struct Platform {
    pub name: &'static str,
    marker: Regex,
    list: &'static [&'static str],
    fields: &'static [(&'static str, &'static [&'static str])],
}

static PLATFORMS: Lazy<Vec<Platform>> = Lazy::new(|| {
    vec![
        Platform {
            name: "shopify",
            marker: Regex::new(r"(?i)cdn\.shopify\.com|Shopify\.theme|\.myshopify\.com")
                .expect("valid regex"),
            list: &[
                "li.grid__item",
                ".product-card",
                ".card-wrapper",
                ".product-item",
                ".grid-product",
            ],
            fields: &[
                (
                    "title",
                    &[
                        ".card__heading a",
                        ".card__heading",
                        ".product-card__title",
                        ".product-item__title",
                        ".grid-product__title",
                    ],
                ),
                ("href", &["a.full-unstyled-link", "a[href*='/products/']", "a[href]"]),
                (
                    "price",
                    &[
                        ".price-item--sale",
                        ".price-item--regular",
                        ".price__sale",
                        ".price",
                        ".product-item__price",
                    ],
                ),
                ("image", &[".card__media img", "img"]),
            ],
        },
        Platform {
            name: "woocommerce",
            marker: Regex::new(r"(?i)woocommerce|wp-content/plugins/woocommerce")
                .expect("valid regex"),
            list: &["ul.products li.product", "li.product", ".products .product"],
            fields: &[
                ("title", &[".woocommerce-loop-product__title", "h2", "h3"]),
                ("href", &["a.woocommerce-LoopProduct-link", "a[href]"]),
                ("price", &[".price ins .amount", ".price .amount", ".price"]),
                ("image", &["img.attachment-woocommerce_thumbnail", "img"]),
            ],
        },
        Platform {
            name: "magento",
            marker: Regex::new(r#"(?i)Magento_|mage/cookies|data-mage-init|text/x-magento-init"#)
                .expect("valid regex"),
            list: &["li.product-item", ".product-items > .item", ".products-grid .item"],
            fields: &[
                ("title", &[".product-item-link", ".product-item-name", ".product-name"]),
                ("href", &["a.product-item-link", "a.product-item-photo", "a[href]"]),
                ("price", &["[data-price-type='finalPrice'] .price", ".price-box .price", ".price"]),
                ("image", &["img.product-image-photo", "img"]),
            ],
        },
        Platform {
            name: "bigcommerce",
            marker: Regex::new(r"(?i)cdn\d*\.bigcommerce\.com|stencil-utils|BCData")
                .expect("valid regex"),
            list: &["li.product", "article.card", ".productGrid .product"],
            fields: &[
                ("title", &[".card-title a", ".card-title"]),
                ("href", &[".card-title a", "a[href]"]),
                ("price", &[".price--withTax", ".price--withoutTax", ".price"]),
                ("image", &[".card-image", "img"]),
            ],
        },
        Platform {
            name: "sfcc",
            marker: Regex::new(r"(?i)demandware\.(?:static|store)|/on/demandware|dwvar_")
                .expect("valid regex"),
            list: &[".product-tile", ".product-grid .product", ".search-result-items .grid-tile"],
            fields: &[
                ("title", &[".pdp-link a", ".product-name a", ".link"]),
                ("href", &[".pdp-link a", ".product-name a", "a[href]"]),
                ("price", &[".price .sales .value", ".product-sales-price", ".price"]),
                ("image", &["img.tile-image", "img"]),
            ],
        },
    ]
});

/// First platform whose marker appears in the page or its URL.
pub(super) fn detect(html: &str, url: &str) -> Option<&'static Platform> {
    PLATFORMS
        .iter()
        .find(|p| p.marker.is_match(url) || p.marker.is_match(html))
}

/// Hard-coded selector bundle for a detected platform.
pub(super) fn mine(platform: &Platform) -> MiningResult {
    let candidates = platform
        .list
        .iter()
        .enumerate()
        .map(|(i, sel)| CandidateSelector {
            selector: sel.to_string(),
            score: 90.0 - i as f64,
        })
        .collect();
    let mut fields = default_field_rules();
    for (name, selectors) in platform.fields {
        let mut rule = FieldRule::new(selectors.iter().copied());
        if let Some(generic) = fields.get(*name) {
            for sel in &generic.selectors {
                if !rule.selectors.contains(sel) {
                    rule.selectors.push(sel.clone());
                }
            }
        }
        fields.insert(name.to_string(), rule);
    }
    MiningResult {
        primary_selector: platform.list.first().map(|s| s.to_string()),
        candidates,
        fields,
        confidence: 0.9,
        source: MiningSource::Platform(platform.name.to_string()),
        containers: Vec::new(),
    }
}
