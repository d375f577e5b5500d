use super::utils::qualified_selector;
use crate::dedupe;
use crate::patterns::PRODUCT_HREF_REGEX;
use crate::selectors::LINK_SELECTOR;
use crate::tools::select::derive_shape;
use crate::types::Buckets;
use scraper::{ElementRef, Html};

/// Minimum number of same-shape siblings required to form a group.
const MIN_SIBLING_GROUP_SIZE: usize = 3;

/// Non-content tags skipped during the walk.
const JUNK_TAGS: &[&str] = &["script", "style", "iframe", "noscript", "template", "svg"];

/// Tags whose groups are navigation rather than listings.
const NAV_TAGS: &[&str] = &["nav", "footer", "aside", "header"];

/// Product-link patterns kept for the `anchors` bucket.
const MAX_ANCHOR_PATTERNS: usize = 4;

/// Repeated same-shape children under one parent.
#[derive(Debug)]
struct SiblingGroup {
    parent: String,
    shape: String,
    quantity: usize,
    in_main: bool,
    in_navigation: bool,
}

/// Buckets from repeated sibling groups and product-link patterns.
///
/// Groups are ordered: outside navigation first, inside `<main>` next, then
/// by how many siblings they hold.
pub(super) fn mine_sibling_buckets(doc: &Html) -> Buckets {
    let mut groups = Vec::new();
    collect_groups(doc.root_element(), &mut groups);
    groups.sort_by_key(|g| {
        std::cmp::Reverse((!g.in_navigation, g.in_main, g.quantity))
    });

    let mut buckets = Buckets::default();
    for group in groups.iter().filter(|g| !g.in_navigation) {
        buckets
            .candidates
            .push(format!("{} > {}", group.parent, group.shape));
        buckets.broad.push(format!("{} a[href]", group.parent));
        buckets.containers.push(group.parent.clone());
    }
    buckets.candidates = dedupe!(buckets.candidates);
    buckets.broad = dedupe!(buckets.broad);
    buckets.containers = dedupe!(buckets.containers);
    buckets.anchors = anchor_patterns(doc);
    buckets
}

fn collect_groups(element: ElementRef, groups: &mut Vec<SiblingGroup>) {
    let children: Vec<ElementRef> = element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| !JUNK_TAGS.contains(&child.value().name()))
        .collect();

    if children.len() >= MIN_SIBLING_GROUP_SIZE {
        let mut shapes: Vec<(String, usize, usize)> = Vec::new();
        for child in &children {
            let shape = derive_shape(child);
            let linked = usize::from(
                child.value().name() == "a" || child.select(&LINK_SELECTOR).next().is_some(),
            );
            match shapes.iter_mut().find(|(s, _, _)| *s == shape) {
                Some(entry) => {
                    entry.1 += 1;
                    entry.2 += linked;
                }
                None => shapes.push((shape, 1, linked)),
            }
        }
        let parent = qualified_selector(&element);
        for (shape, quantity, linked) in shapes {
            if quantity >= MIN_SIBLING_GROUP_SIZE && linked * 2 >= quantity {
                groups.push(SiblingGroup {
                    parent: parent.clone(),
                    shape,
                    quantity,
                    in_main: is_inside(&element, &["main"]),
                    in_navigation: is_inside(&element, NAV_TAGS),
                });
            }
        }
    }

    for child in children {
        collect_groups(child, groups);
    }
}

/// Whether the element or one of its ancestors has one of `tags`.
fn is_inside(element: &ElementRef, tags: &[&str]) -> bool {
    if tags.contains(&element.value().name()) {
        return true;
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| tags.contains(&a.value().name()))
}

/// `a[href*='/products/']`-style patterns from product links on the page,
/// most frequent first.
fn anchor_patterns(doc: &Html) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for link in doc.select(&LINK_SELECTOR) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(found) = PRODUCT_HREF_REGEX.find(href) else {
            continue;
        };
        let Some(segment) = found
            .as_str()
            .strip_prefix('/')
            .and_then(|rest| rest.split('/').next())
            .filter(|seg| seg.chars().all(|c| c.is_ascii_alphabetic() || c == '-'))
            .filter(|seg| !seg.is_empty())
        else {
            continue;
        };
        let pattern = format!("a[href*='/{segment}/']");
        match counts.iter_mut().find(|(p, _)| *p == pattern) {
            Some(entry) => entry.1 += 1,
            None => counts.push((pattern, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(MAX_ANCHOR_PATTERNS)
        .map(|(p, _)| p)
        .collect()
}
