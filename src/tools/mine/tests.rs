#[cfg(test)]
mod tests {
    use crate::tools::mine::*;
    use crate::types::MiningSource;

    fn card_grid(count: usize) -> String {
        let cards: String = (0..count)
            .map(|i| {
                format!(
                    r#"<div class="product-card">
                         <a href="/products/item-{i}"><img src="/img/{i}.jpg"></a>
                         <h3><a href="/products/item-{i}">Item number {i}</a></h3>
                         <span class="price">$19.99</span>
                       </div>"#
                )
            })
            .collect();
        format!(
            r#"<html><body>
                 <header class="site-header"><nav><a href="/">Home</a><a href="/sale">Sale</a></nav></header>
                 <main><div class="product-grid">{cards}</div></main>
               </body></html>"#
        )
    }

    #[test]
    fn test_dom_sweep_finds_card_selector() {
        let html = card_grid(8);
        let result = mine_candidates(&html, "https://shop.example.com/collections/all");
        assert_eq!(result.source, MiningSource::DomSweep);
        assert_eq!(
            result.primary_selector.as_deref(),
            Some("div.product-grid > div.product-card")
        );
        assert!(result
            .candidates
            .iter()
            .any(|c| c.selector == "div.product-grid a[href]"));
        assert!(result.confidence > 0.5 && result.confidence <= 0.95);
        assert!(result.fields.contains_key("price"));
    }

    #[test]
    fn test_candidates_are_ranked_best_first() {
        let result = mine_candidates(&card_grid(5), "https://shop.example.com/");
        let scores: Vec<f64> = result.candidates.iter().map(|c| c.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(
            result.primary_selector.as_deref(),
            Some(result.candidates[0].selector.as_str())
        );
    }

    #[test]
    fn test_platform_marker_short_circuits() {
        let html = format!(
            r#"<link rel="stylesheet" href="https://cdn.shopify.com/s/files/theme.css">{}"#,
            card_grid(4)
        );
        let result = mine_candidates(&html, "https://shop.example.com/collections/all");
        assert_eq!(result.source, MiningSource::Platform("shopify".into()));
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.primary_selector.as_deref(), Some("li.grid__item"));
        assert!(result.fields["title"].selectors.contains(&"h3".to_string()));
    }

    #[test]
    fn test_microdata_common_ancestor() {
        let items: String = (0..6)
            .map(|i| {
                format!(
                    r#"<li class="result"><div itemscope itemtype="https://schema.org/Product">
                         <a itemprop="url" href="/p/{i}"><span itemprop="name">Thing {i}</span></a>
                       </div></li>"#
                )
            })
            .collect();
        let html = format!(r#"<body><ul id="search-results">{items}</ul></body>"#);
        let result = mine_candidates(&html, "https://example.com/search?q=thing");
        assert_eq!(result.source, MiningSource::Microdata);
        assert_eq!(result.confidence, 0.85);
        assert_eq!(
            result.primary_selector.as_deref(),
            Some("#search-results > li.result")
        );
        assert_eq!(result.containers, vec!["#search-results".to_string()]);
    }

    #[test]
    fn test_fewer_than_six_microdata_products_is_not_enough() {
        let items: String = (0..5)
            .map(|i| format!(r#"<div itemtype="http://schema.org/Product">{i}</div>"#))
            .collect();
        let result = mine_candidates(&format!("<body>{items}</body>"), "https://example.com/");
        assert_ne!(result.source, MiningSource::Microdata);
    }

    #[test]
    fn test_fallback_on_bare_page() {
        let result = mine_candidates("<p>nothing to see</p>", "https://example.com/");
        assert_eq!(result.source, MiningSource::Fallback);
        assert_eq!(result.primary_selector.as_deref(), Some("main a[href]"));
        assert_eq!(result.candidates[1].selector, "a[href]");
        assert_eq!(result.confidence, 0.1);
    }

    #[test]
    fn test_to_buckets_sorts_by_role() {
        let result = mine_candidates(&card_grid(8), "https://shop.example.com/");
        let buckets = result.to_buckets();
        assert_eq!(buckets.list, vec!["div.product-grid > div.product-card".to_string()]);
        assert!(buckets.broad.contains(&"div.product-grid a[href]".to_string()));
        assert!(buckets.containers.contains(&"div.product-grid".to_string()));
        assert_eq!(buckets.candidates.len(), result.candidates.len());
    }

    #[test]
    fn test_mine_light_never_fills_list() {
        let buckets = mine_light(&card_grid(6));
        assert!(buckets.list.is_empty());
        assert_eq!(
            buckets.candidates.first().map(String::as_str),
            Some("div.product-grid > div.product-card")
        );
        assert!(buckets.anchors.contains(&"a[href*='/products/']".to_string()));
        assert!(!buckets.containers.iter().any(|c| c.contains("nav")));
    }
}
