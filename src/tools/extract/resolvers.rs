//! Deep fallbacks, one ordered chain per field. Each resolver either finds a
//! value or passes to the next one.

use super::fields::{accept_href, accept_image, first_srcset_url};
use super::jsonld::PriceIndex;
use super::price::{normalize_price, normalize_price_loose};
use crate::patterns::{is_product_href, CTA_REGEX};
use crate::selectors::{LINK_SELECTOR, META_DESCRIPTION_SELECTOR, PARAGRAPH_SELECTOR, STYLED_SELECTOR};
use crate::tools::clean::clean_opt;
use crate::tools::select::select_all;
use crate::types::ExtractedItem;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};

/// Page-level facts shared by every card.
#[derive(Debug, Default)]
pub(super) struct PageContext {
    pub prices: PriceIndex,
    pub meta_description: Option<String>,
}

impl PageContext {
    pub fn new(doc: &Html, prices: PriceIndex) -> Self {
        let meta_description = doc
            .select(&META_DESCRIPTION_SELECTOR)
            .filter_map(|m| m.value().attr("content"))
            .find_map(clean_opt);
        Self {
            prices,
            meta_description,
        }
    }
}

pub(super) type Resolver = fn(ElementRef<'_>, &ExtractedItem, &PageContext) -> Option<String>;

pub(super) const HREF_CHAIN: &[Resolver] = &[href_from_self, href_from_product_link, href_from_any_link];
pub(super) const TITLE_CHAIN: &[Resolver] = &[title_from_classes, title_from_product_link];
pub(super) const IMAGE_CHAIN: &[Resolver] = &[image_from_attributes, image_from_background];
pub(super) const PRICE_CHAIN: &[Resolver] = &[
    price_from_structured_data,
    price_from_classes,
    price_from_anchor,
    price_from_text_scan,
];
pub(super) const DESCRIPTION_CHAIN: &[Resolver] = &[description_from_paragraph, description_from_meta];

pub(super) fn resolve(
    chain: &[Resolver],
    card: ElementRef,
    item: &ExtractedItem,
    page: &PageContext,
) -> Option<String> {
    chain.iter().find_map(|resolver| resolver(card, item, page))
}

/// First match of any selector, read through `read`.
fn first_of<F>(scope: ElementRef, selectors: &[&str], read: F) -> Option<String>
where
    F: Fn(ElementRef) -> Option<String>,
{
    selectors.iter().find_map(|sel| {
        select_all(scope, sel)
            .ok()?
            .into_iter()
            .find_map(|el| read(el))
    })
}

fn text_of(el: ElementRef) -> Option<String> {
    clean_opt(&el.text().collect::<String>())
}

/* ---------------- href ---------------- */

fn href_from_self(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    card.value().attr("href").and_then(accept_href)
}

fn href_from_product_link(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    card.select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| is_product_href(href))
        .and_then(accept_href)
}

fn href_from_any_link(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    card.select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .find_map(accept_href)
}

/* ---------------- title ---------------- */

const TITLE_SELECTORS: &[&str] = &[
    ".product-title",
    ".product-name",
    ".product__title",
    ".product-item-name",
    ".product-card__title",
    ".card__heading",
    ".card-title",
    ".item-title",
    ".item-name",
    ".title",
    ".name",
    "[itemprop='name']",
    "h2",
    "h3",
    "h4",
];

fn title_from_classes(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    first_of(card, TITLE_SELECTORS, text_of)
}

fn title_from_product_link(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    let own = card
        .value()
        .attr("href")
        .filter(|h| is_product_href(h))
        .and_then(|_| text_of(card));
    own.or_else(|| {
        card.select(&LINK_SELECTOR)
            .filter(|a| a.value().attr("href").map(is_product_href).unwrap_or(false))
            .find_map(|a| text_of(a).or_else(|| a.value().attr("title").and_then(clean_opt)))
    })
}

/* ---------------- image ---------------- */

const IMAGE_ATTRIBUTES: &[&str] = &[
    "src",
    "data-src",
    "data-original",
    "data-lazy-src",
    "data-lazy",
    "data-srcset",
    "srcset",
];

static BACKGROUND_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)background(?:-image)?\s*:[^;]*url\(\s*['"]?([^'")]+)['"]?\s*\)"#)
        .expect("valid regex")
});

fn image_from_attributes(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    let own = std::iter::once(card).filter(|c| matches!(c.value().name(), "img" | "source"));
    let nested = card
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "img" | "source"));
    own.chain(nested).find_map(|img| {
        IMAGE_ATTRIBUTES.iter().find_map(|attr| {
            let raw = img.value().attr(attr)?;
            let url = if attr.ends_with("srcset") {
                first_srcset_url(raw)?
            } else {
                raw.to_string()
            };
            accept_image(&url)
        })
    })
}

fn image_from_background(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    let own = card.value().attr("style");
    let nested = card
        .select(&STYLED_SELECTOR)
        .filter_map(|el| el.value().attr("style"));
    own.into_iter().chain(nested).find_map(|style| {
        BACKGROUND_URL_REGEX
            .captures(style)
            .and_then(|caps| caps.get(1))
            .and_then(|m| accept_image(m.as_str()))
    })
}

/* ---------------- price ---------------- */

/// Text nodes inspected by the last-resort scan.
const PRICE_SCAN_NODES: usize = 140;

const PRICE_SELECTORS: &[&str] = &[
    "[itemprop='price']",
    ".price-item--sale",
    ".sale-price",
    ".price--sale",
    ".special-price",
    ".price",
    ".product-price",
    ".price-item",
    ".amount",
    "[data-price]",
    "[class*='price']",
];

fn price_from_structured_data(_: ElementRef, item: &ExtractedItem, page: &PageContext) -> Option<String> {
    page.prices
        .lookup(item.href.as_deref(), item.title.as_deref())
}

fn price_from_classes(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    first_of(card, PRICE_SELECTORS, read_price).or_else(|| {
        let parent = card.parent().and_then(ElementRef::wrap)?;
        // A parent holding peer cards would hand out a neighbour's price.
        let has_peer = parent
            .children()
            .filter_map(ElementRef::wrap)
            .any(|s| s.id() != card.id() && s.value().name() == card.value().name());
        if has_peer {
            return None;
        }
        first_of(parent, PRICE_SELECTORS, read_price)
    })
}

fn read_price(el: ElementRef) -> Option<String> {
    el.value()
        .attr("content")
        .and_then(normalize_price_loose)
        .or_else(|| el.value().attr("data-price").and_then(normalize_price_loose))
        .or_else(|| normalize_price(&el.text().collect::<String>()))
}

fn price_from_anchor(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    card.select(&LINK_SELECTOR).find_map(|a| {
        a.descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.id() != a.id())
            .find_map(|el| {
                let own: String = el
                    .children()
                    .filter_map(|n| match n.value() {
                        Node::Text(t) => Some(&**t),
                        _ => None,
                    })
                    .collect();
                normalize_price(&own)
            })
    })
}

fn price_from_text_scan(card: ElementRef, _: &ExtractedItem, _: &PageContext) -> Option<String> {
    card.descendants()
        .take(PRICE_SCAN_NODES)
        .filter_map(|node| match node.value() {
            Node::Text(t) => Some(&**t),
            _ => None,
        })
        .find_map(normalize_price)
}

/* ---------------- description ---------------- */

const DESCRIPTION_MIN_CHARS: usize = 15;
const DESCRIPTION_MAX_CHARS: usize = 300;

fn description_from_paragraph(card: ElementRef, item: &ExtractedItem, _: &PageContext) -> Option<String> {
    card.select(&PARAGRAPH_SELECTOR).find_map(|p| {
        let text = text_of(p)?;
        let len = text.chars().count();
        let is_title = item.title.as_deref() == Some(text.as_str());
        let fits = (DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&len);
        (fits && !is_title && !CTA_REGEX.is_match(&text) && normalize_price(&text).is_none())
            .then_some(text)
    })
}

fn description_from_meta(_: ElementRef, _: &ExtractedItem, page: &PageContext) -> Option<String> {
    page.meta_description.clone()
}
