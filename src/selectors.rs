//! Shared Selectors

use once_cell::sync::Lazy;
use scraper::Selector;

/// Selector for anchor elements with hrefs.
pub static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Selector for JSON-LD script tags.
pub static JSONLD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script[type='application/ld+json']").expect("valid jsonld selector")
});

/// Selector for headings that usually carry an item title.
pub static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid heading selector"));

/// Selector for elements declaring a microdata type.
pub static ITEMTYPE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[itemtype]").expect("valid itemtype selector"));

/// Selector for paragraphs.
pub static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("valid paragraph selector"));

/// Selector for the page meta description.
pub static META_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[name='description'], meta[property='og:description']")
        .expect("valid meta description selector")
});

/// Selector for `<main>` then `<body>`.
pub static MAIN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("main").expect("valid main selector"));

pub static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("valid body selector"));

/// Selector for elements carrying an inline style.
pub static STYLED_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[style]").expect("valid style selector"));
