#[cfg(test)]
mod tests {
    use crate::tools::select::*;
    use scraper::Html;

    #[test]
    fn test_invalid_selector_is_typed_error() {
        let doc = Html::parse_document("<div class='a'></div>");
        let err = select_doc(&doc, "div[[").unwrap_err();
        assert_eq!(err.selector, "div[[");
        assert!(select_doc(&doc, "   ").is_err());
        assert_eq!(select_doc(&doc, "div.a").unwrap().len(), 1);
    }

    #[test]
    fn test_hashed_and_state_classes_are_unstable() {
        assert!(is_unstable_class("css-1x2y3z"));
        assert!(is_unstable_class("sc-bdVaJa"));
        assert!(is_unstable_class("ProductCard_root__a1B2c"));
        assert!(is_unstable_class("is-active"));
        assert!(is_unstable_class("active"));
        assert!(is_unstable_class("md:w-1/2"));
        assert!(is_unstable_class("2col"));

        assert!(!is_unstable_class("product-card"));
        assert!(!is_unstable_class("grid__item"));
        assert!(!is_unstable_class("col-md-4"));
    }

    #[test]
    fn test_stable_ids() {
        assert!(is_stable_id("product-grid"));
        assert!(!is_stable_id("ember1234"));
        assert!(!is_stable_id("item-123456"));
        assert!(!is_stable_id("root-a8f3k2"));
    }

    #[test]
    fn test_derive_selector_prefers_stable_id() {
        let doc = Html::parse_document(
            r#"<ul id="results" class="grid"><li class="card css-9kq2x1 tile extra">x</li></ul>
               <ul id="list-98765" class="grid wide"></ul>"#,
        );
        let uls = select_doc(&doc, "ul").unwrap();
        assert_eq!(derive_selector(&uls[0]), "#results");
        assert_eq!(derive_selector(&uls[1]), "ul.grid.wide");

        let li = select_doc(&doc, "li").unwrap();
        assert_eq!(derive_selector(&li[0]), "li.card.tile");
    }

    #[test]
    fn test_derived_classes_keep_source_order() {
        let doc = Html::parse_document(r#"<div class="zeta alpha zeta mid">x</div>"#);
        let div = select_doc(&doc, "div").unwrap()[0];
        let tokens: Vec<&str> = class_tokens(div.value()).collect();
        assert_eq!(tokens, vec!["zeta", "alpha", "zeta", "mid"]);
        assert_eq!(derive_selector(&div), "div.zeta.alpha");
        assert_eq!(derive_shape(&div), "div.zeta.alpha");
    }

    #[test]
    fn test_specificity() {
        assert_eq!(specificity("a[href]"), 4);
        assert_eq!(specificity("main a[href]"), 5);
        assert_eq!(specificity("div.product-grid > div.product-card"), 7);
        assert_eq!(specificity("a[href*='.html']"), 4);
    }

    #[test]
    fn test_normalize_selector_strips_generated_classes() {
        assert_eq!(
            normalize_selector("div.grid.css-1x2y3z   >  li.card"),
            Some("div.grid > li.card".to_string())
        );
        assert_eq!(normalize_selector(".css-1x2y3z a[href]"), None);
        assert_eq!(normalize_selector("a[href*='.a1b2c3']"), Some("a[href*='.a1b2c3']".to_string()));
        assert_eq!(normalize_selector("div[["), None);
        assert_eq!(normalize_selector(""), None);
    }

    #[test]
    fn test_normalize_selector_is_idempotent() {
        for raw in ["ul.products  li.product.is-active", "main a[href]", "#results > .card"] {
            let once = normalize_selector(raw).unwrap();
            assert_eq!(normalize_selector(&once), Some(once.clone()));
        }
    }

    #[test]
    fn test_push_candidate_keeps_max_score() {
        let mut cands = Vec::new();
        push_candidate(&mut cands, "a[href]".into(), 20.0);
        push_candidate(&mut cands, "main a[href]".into(), 30.0);
        push_candidate(&mut cands, "a[href]".into(), 25.0);
        push_candidate(&mut cands, "a[href]".into(), 5.0);
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].score, 25.0);
    }

    #[test]
    fn test_rank_breaks_ties_by_specificity() {
        let mut cands = Vec::new();
        push_candidate(&mut cands, "div a[href]".into(), 40.0);
        push_candidate(&mut cands, "div.grid > div.card".into(), 40.0);
        push_candidate(&mut cands, "a[href]".into(), 10.0);
        rank_candidates(&mut cands);
        assert_eq!(cands[0].selector, "div.grid > div.card");
        assert_eq!(cands[2].selector, "a[href]");
    }
}
