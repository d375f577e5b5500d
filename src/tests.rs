//! Tests

use crate::config::{EngineOptions, KindDefault, KindDefaults};
use crate::engine::*;
use crate::services::store::{MemoryStore, ProfileStore};
use crate::tools::extract::Strategy;
use crate::types::{BucketKind, HostKey, MiningSource};

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.shop.example.com/collections/all";

    fn card_page(count: usize) -> String {
        let cards: String = (0..count)
            .map(|i| {
                format!(
                    r#"<div class="product-card">
                         <a href="/products/item-{i}"><img src="/img/{i}.jpg" alt=""></a>
                         <h3 class="product-title"><a href="/products/item-{i}">Item number {i}</a></h3>
                         <span class="price">$19.99</span>
                       </div>"#
                )
            })
            .collect();
        format!(
            r#"<html><head><title>All products</title></head><body>
                 <header class="site-header"><nav><a href="/">Home</a><a href="/sale">Sale</a></nav></header>
                 <main><div class="product-grid">{cards}</div></main>
                 <footer class="site-footer"><a href="/about">About</a></footer>
               </body></html>"#
        )
    }

    fn host() -> HostKey {
        HostKey::from_raw(URL)
    }

    #[test]
    fn test_host_key_keeps_registrable_domain() {
        assert_eq!(HostKey::from_raw("https://www.shop.example.com/a").as_str(), "shop.example.com");
        assert_eq!(HostKey::from_raw("en.example.com").as_str(), "example.com");
        assert_eq!(HostKey::from_raw("ab.co.uk").as_str(), "ab.co.uk");
        assert_eq!(HostKey::from_raw("www.ab.com.au").as_str(), "ab.com.au");
        assert_eq!(HostKey::from_raw("en.shop.co.uk").as_str(), "shop.co.uk");
        assert_eq!(HostKey::from_raw("Shop.Example.COM:8080").as_str(), "shop.example.com");
    }

    #[test]
    fn test_unseen_grid_yields_full_items() {
        let mut store = ProfileStore::in_memory();
        let html = card_page(8);
        let report = run_snapshot(&mut store, &SnapshotInput::new(URL, &html), &EngineOptions::default())
            .unwrap();

        assert_eq!(report.summary.mining_source, MiningSource::DomSweep);
        assert!(matches!(
            &report.summary.strategy,
            Strategy::Selector { bucket: BucketKind::List, selector } if selector.contains("product-card")
        ));
        assert_eq!(report.items.len(), 8);
        for item in &report.items {
            assert!(item.title.is_some());
            assert!(item.price.as_deref() == Some("$19.99"));
            assert!(item.image.as_deref().unwrap().starts_with("https://www.shop.example.com/img/"));
            assert!(item.href.as_deref().unwrap().starts_with("https://www.shop.example.com/products/item-"));
        }
        assert!(report.items.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(report.items[0].title.as_deref(), Some("Item number 0"));
        assert!(matches!(report.persist, PersistStatus::Saved { .. }));
    }

    #[test]
    fn test_second_visit_matches_learned_profile() {
        let mut store = ProfileStore::in_memory();
        let html = card_page(8);
        let input = SnapshotInput::new(URL, &html);
        let opts = EngineOptions::default();

        let first = run_snapshot(&mut store, &input, &opts).unwrap();
        assert_eq!(first.summary.profile_score, 0);
        let learned = &store.profiles(&host())[0];
        assert!(!learned.buckets.list.is_empty());
        if let Strategy::Selector { selector, .. } = &first.summary.strategy {
            assert_eq!(&learned.buckets.list[0], selector);
        }

        let second = run_snapshot(&mut store, &input, &opts).unwrap();
        assert!(second.summary.profile_score >= 2);
        assert_eq!(second.summary.profile_id.as_deref(), Some(learned_id(&store).as_str()));
        assert_eq!(second.items.len(), 8);
        assert_eq!(store.profiles(&host())[0].metrics.runs, 2);
        assert!(!store.profiles(&host())[0].buckets.list.is_empty());
    }

    fn learned_id(store: &ProfileStore) -> String {
        store.profiles(&host())[0].id.clone()
    }

    #[test]
    fn test_item_count_change_reuses_profile() {
        let mut store = ProfileStore::in_memory();
        let opts = EngineOptions::default();
        let first = run_snapshot(&mut store, &SnapshotInput::new(URL, &card_page(8)), &opts).unwrap();
        let second = run_snapshot(&mut store, &SnapshotInput::new(URL, &card_page(7)), &opts).unwrap();

        assert_ne!(first.summary.fingerprint, second.summary.fingerprint);
        assert!(second.summary.profile_score >= 2);
        let profiles = store.profiles(&host());
        assert_eq!(profiles.len(), 1);
        assert_eq!(second.summary.profile_id.as_deref(), Some(profiles[0].id.as_str()));
        assert_eq!(profiles[0].metrics.runs, 2);
        assert_eq!(
            profiles[0].match_predicate.template_hash.as_deref(),
            Some(second.summary.fingerprint.as_str())
        );
    }

    #[test]
    fn test_mined_selectors_outrank_kind_default() {
        let promos: String = ["spring", "summer"]
            .iter()
            .map(|slug| {
                format!(r#"<div class="promo-tile"><a href="/products/promo-{slug}">Promo {slug}</a></div>"#)
            })
            .collect();
        let html = card_page(8).replace("<main>", &format!("<main>{promos}"));
        let mut input = SnapshotInput::new(URL, &html);
        input.kind_default = Some(KindDefault {
            list: vec!["div.promo-tile".into()],
            ..KindDefault::default()
        });

        let mut store = ProfileStore::in_memory();
        let report = run_snapshot(&mut store, &input, &EngineOptions::default()).unwrap();
        assert!(matches!(
            &report.summary.strategy,
            Strategy::Selector { bucket: BucketKind::List, selector } if selector.contains("product-card")
        ));
        assert_eq!(report.items.len(), 8);
    }

    #[test]
    fn test_structured_data_only_page() {
        let products: Vec<String> = (1..=5)
            .map(|i| {
                format!(
                    r#"{{"@type":"ListItem","position":{i},"item":{{"@type":"Product","name":"Chair {i}",
                        "url":"https://shop.example.com/p/chair-{i}","image":"https://cdn.example.com/{i}.jpg",
                        "offers":{{"@type":"Offer","price":"{i}9.00","priceCurrency":"USD"}}}}}}"#
                )
            })
            .collect();
        let html = format!(
            r#"<html><head><script type="application/ld+json">
                 {{"@context":"https://schema.org","@type":"ItemList","itemListElement":[{}]}}
               </script></head><body><div id="app"><p>Loading</p></div></body></html>"#,
            products.join(",")
        );
        let mut store = ProfileStore::in_memory();
        let report = run_snapshot(
            &mut store,
            &SnapshotInput::new("https://shop.example.com/chairs", &html),
            &EngineOptions::default(),
        )
        .unwrap();

        assert_eq!(report.summary.strategy, Strategy::StructuredData);
        assert_eq!(report.items.len(), 5);
        let chair = report
            .items
            .iter()
            .find(|i| i.title.as_deref() == Some("Chair 3"))
            .unwrap();
        assert_eq!(chair.price.as_deref(), Some("$39.00"));
        assert_eq!(chair.href.as_deref(), Some("https://shop.example.com/p/chair-3"));
    }

    #[test]
    fn test_url_shaped_price_stays_unset() {
        let cards: String = ["abc-123", "def-456", "ghi-789"]
            .iter()
            .map(|slug| {
                format!(
                    r#"<div class="card"><a href="/products/{slug}">Widget {slug}</a>
                         <span class="price">/products/{slug}</span></div>"#
                )
            })
            .collect();
        let html = format!(r#"<body><div class="grid">{cards}</div></body>"#);
        let mut store = ProfileStore::in_memory();
        let report = run_snapshot(
            &mut store,
            &SnapshotInput::new("https://shop.example.com/widgets", &html),
            &EngineOptions::default(),
        )
        .unwrap();
        assert!(!report.items.is_empty());
        assert!(report.items.iter().all(|i| i.price.is_none()));
    }

    #[test]
    fn test_no_learn_skips_persistence() {
        let backend = MemoryStore::new();
        let mut store = ProfileStore::open(backend.clone()).unwrap();
        let opts = EngineOptions {
            learn: false,
            ..EngineOptions::default()
        };
        let report = run_snapshot(&mut store, &SnapshotInput::new(URL, &card_page(4)), &opts).unwrap();
        assert_eq!(report.persist, PersistStatus::Skipped);
        assert_eq!(backend.writes(), 0);
    }

    #[test]
    fn test_failed_write_is_reported_not_fatal() {
        let backend = MemoryStore::new();
        backend.fail_writes(true);
        let mut store = ProfileStore::open(backend.clone()).unwrap();
        let report = run_snapshot(&mut store, &SnapshotInput::new(URL, &card_page(4)), &EngineOptions::default())
            .unwrap();
        assert_eq!(report.items.len(), 4);
        assert!(matches!(report.persist, PersistStatus::Failed { retryable: true, .. }));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_invalid_url_is_an_error() {
        let mut store = ProfileStore::in_memory();
        let err = run_snapshot(&mut store, &SnapshotInput::new("not a url", "<p></p>"), &EngineOptions::default())
            .unwrap_err();
        assert!(matches!(err, crate::error::ListwiseError::InvalidUrl(_)));
    }

    #[test]
    fn test_early_snapshot_is_used_when_settled_page_is_empty() {
        let mut input = SnapshotInput::new(URL, "<html><body><div id=\"app\"></div></body></html>");
        input.early_html = Some(card_page(4));
        let mut store = ProfileStore::in_memory();
        let report = run_snapshot(&mut store, &input, &EngineOptions::default()).unwrap();
        assert!(report.summary.used_early_html);
        assert_eq!(report.items.len(), 4);
    }

    /* ---------------- async engine ---------------- */

    struct FixedClassifier(f64);

    impl PageClassifier for FixedClassifier {
        fn classify(&self, _html: &str, _url: &str) -> Option<Classification> {
            Some(Classification {
                kind: "tiles".into(),
                confidence: self.0,
            })
        }
    }

    fn tile_page() -> String {
        let tiles: String = ["alpha-1", "beta-2", "gamma-3"]
            .iter()
            .map(|slug| {
                format!(
                    r#"<li class="tile"><a href="/products/{slug}"><img src="/{slug}.jpg"></a>
                         <span class="tile-name">Tile {slug}</span></li>"#
                )
            })
            .collect();
        format!(r#"<html><body><main><ul class="results">{tiles}</ul></main></body></html>"#)
    }

    fn tile_kinds() -> KindDefaults {
        KindDefaults::from_json(r#"{"tiles": {"list": ["li.tile"], "fields": {"title": ".tile-name"}}}"#)
            .unwrap()
    }

    #[tokio::test]
    async fn test_engine_learns_across_runs() {
        let html = card_page(8);
        let renderer = SnapshotRenderer::new().with_page(
            URL,
            RenderedPage {
                html: String::new(),
                final_html: html,
            },
        );
        let engine = Engine::new(ProfileStore::in_memory(), renderer);

        let first = engine.run(URL).await.unwrap();
        assert_eq!(first.items.len(), 8);
        let second = engine.run(URL).await.unwrap();
        assert!(second.summary.profile_score >= 2);
        let runs = engine
            .with_store(|store| store.profiles(&host())[0].metrics.runs)
            .await;
        assert_eq!(runs, 2);
    }

    #[tokio::test]
    async fn test_engine_applies_confident_kind_default() {
        let url = "https://tiles.example.com/shop";
        let renderer = SnapshotRenderer::new().with_page(
            url,
            RenderedPage {
                html: String::new(),
                final_html: tile_page(),
            },
        );
        let engine = Engine::new(ProfileStore::in_memory(), renderer)
            .with_classifier(FixedClassifier(0.9))
            .with_kinds(tile_kinds());
        let report = engine.run(url).await.unwrap();
        assert!(report
            .items
            .iter()
            .any(|i| i.title.as_deref() == Some("Tile beta-2")));
        let learned = engine
            .with_store(|store| store.profiles(&HostKey::from_raw(url))[0].fields.clone())
            .await;
        assert_eq!(learned.get("title").map(|r| r.selectors.clone()), Some(vec![".tile-name".to_string()]));
    }

    #[tokio::test]
    async fn test_engine_ignores_unsure_classification() {
        let url = "https://tiles.example.com/shop";
        let renderer = SnapshotRenderer::new().with_page(
            url,
            RenderedPage {
                html: String::new(),
                final_html: tile_page(),
            },
        );
        let engine = Engine::new(ProfileStore::in_memory(), renderer)
            .with_classifier(FixedClassifier(0.2))
            .with_kinds(tile_kinds());
        engine.run(url).await.unwrap();
        let learned = engine
            .with_store(|store| store.profiles(&HostKey::from_raw(url))[0].fields.clone())
            .await;
        assert!(learned.is_empty());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_retryable_render_error() {
        let engine = Engine::new(ProfileStore::in_memory(), SnapshotRenderer::new());
        let err = engine.run(URL).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_host_locks_are_per_host() {
        let locks = HostLocks::default();
        let a = HostKey::from_raw("a.example.com");
        let b = HostKey::from_raw("b.example.com");
        let guard_a = locks.acquire(&a).await;
        // a different host is not blocked
        let guard_b = locks.acquire(&b).await;
        drop(guard_a);
        let _again = locks.acquire(&a).await;
        drop(guard_b);
    }
}
