use crate::selectors::LINK_SELECTOR;
use crate::tools::select::select_all;
use scraper::ElementRef;
use std::collections::HashSet;
use tracing::debug;

/// Links inside one matched node before each link counts as its own item.
const MANY_LINKS: usize = 6;

/// Matches of a candidate selector needed before their parents count as cards.
const MIN_CANDIDATE_MATCHES: usize = 2;

/// Turn matched list nodes into cards, in document order, without repeats.
///
/// A selector that matched several linked nodes is taken to match the cards
/// themselves; a single match is treated as the grid holding them.
pub(super) fn resolve_cards<'a>(
    nodes: &[ElementRef<'a>],
    containers: &[String],
    candidates: &[String],
    max_cards: usize,
) -> Vec<ElementRef<'a>> {
    let repeated = nodes.len() >= 2;
    let mut seen = HashSet::new();
    let mut cards = Vec::new();
    for node in nodes {
        for card in cards_of(*node, repeated, containers, candidates) {
            if seen.insert(card.id()) {
                cards.push(card);
                if cards.len() >= max_cards {
                    return cards;
                }
            }
        }
    }
    cards
}

fn cards_of<'a>(
    node: ElementRef<'a>,
    repeated: bool,
    containers: &[String],
    candidates: &[String],
) -> Vec<ElementRef<'a>> {
    if node.value().name() == "a" {
        return vec![node];
    }
    let links: Vec<ElementRef<'a>> = node.select(&LINK_SELECTOR).collect();
    if links.len() >= MANY_LINKS {
        return link_cards(node, &links);
    }
    if repeated && !links.is_empty() {
        return vec![node];
    }
    if let Some(found) = declared_containers(node, containers) {
        return found;
    }
    if let Some(found) = candidate_parents(node, candidates) {
        return found;
    }
    let nested: Vec<ElementRef<'a>> = node
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| c.children().filter_map(ElementRef::wrap).next().is_some())
        .collect();
    if nested.len() >= 2 {
        nested
    } else {
        vec![node]
    }
}

/// One card per link: the widest ancestor below `scope` whose links all
/// share the link's href, so an image link and a title link to the same
/// product resolve to the same card.
fn link_cards<'a>(scope: ElementRef<'a>, links: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
    links
        .iter()
        .map(|link| {
            let href = link.value().attr("href").unwrap_or_default();
            let mut card = *link;
            while let Some(parent) = card.parent().and_then(ElementRef::wrap) {
                if parent.id() == scope.id() {
                    break;
                }
                let same_target = parent
                    .select(&LINK_SELECTOR)
                    .all(|a| a.value().attr("href").unwrap_or_default() == href);
                if !same_target {
                    break;
                }
                card = parent;
            }
            card
        })
        .collect()
}

fn declared_containers<'a>(node: ElementRef<'a>, containers: &[String]) -> Option<Vec<ElementRef<'a>>> {
    for sel in containers {
        match select_all(node, sel) {
            Ok(found) if !found.is_empty() => return Some(found),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "skipping container selector"),
        }
    }
    None
}

fn candidate_parents<'a>(node: ElementRef<'a>, candidates: &[String]) -> Option<Vec<ElementRef<'a>>> {
    for sel in candidates {
        let found = match select_all(node, sel) {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "skipping candidate selector");
                continue;
            }
        };
        if found.len() < MIN_CANDIDATE_MATCHES {
            continue;
        }
        let mut seen = HashSet::new();
        let parents: Vec<ElementRef<'a>> = found
            .iter()
            .filter_map(|el| el.parent().and_then(ElementRef::wrap))
            .filter(|p| p.id() != node.id() && seen.insert(p.id()))
            .collect();
        if parents.len() >= MIN_CANDIDATE_MATCHES {
            return Some(parents);
        }
    }
    None
}
