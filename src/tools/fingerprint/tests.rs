#[cfg(test)]
mod tests {
    use crate::tools::fingerprint::*;

    #[test]
    fn test_fingerprint_counts_structure() {
        let html = r#"
            <html><body class="collection template-list extra">
                <div class="product-card" data-id="1"><a href="/p/1">One</a></div>
                <div class="product-card" data-id="2"><a href="/p/2">Two</a></div>
                <div id="result-box"><a href="/about">About</a></div>
                <div></div>
            </body></html>
        "#;
        assert_eq!(fingerprint(html), "c3-d750-da2-ld0-collection.template-list");
    }

    #[test]
    fn test_fingerprint_prefers_main_and_flags_jsonld() {
        let html = r#"
            <html><head><script type="application/ld+json">{}</script></head>
            <body class="page"><main class="Listing"><p>nothing</p></main></body></html>
        "#;
        assert_eq!(fingerprint(html), "c0-d0-da0-ld1-listing");
    }

    #[test]
    fn test_fingerprint_is_stable_for_same_document() {
        let html = "<html><body><div class='tile'><a href='/x'>x</a></div></body></html>";
        assert_eq!(fingerprint(html), fingerprint(html));
        assert!(fingerprint(html).ends_with("-0"));
    }

    #[test]
    fn test_top_classes_follow_source_order() {
        let html = "<html><body class='zeta alpha mid'><p>x</p></body></html>";
        assert!(fingerprint(html).ends_with("-zeta.alpha"));
    }

    #[test]
    fn test_template_family_ignores_counts() {
        let eight = "c19-d1500-da0-ld0-collection.template-list";
        let seven = "c17-d1400-da3-ld0-collection.template-list";
        assert_eq!(template_family(eight), "ld0-collection.template-list");
        assert_eq!(template_family(eight), template_family(seven));
        assert_eq!(template_family("opaque"), "opaque");
    }
}
