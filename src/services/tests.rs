#[cfg(test)]
mod tests {
    use crate::error::ListwiseError;
    use crate::services::store::*;
    use crate::types::*;
    use chrono::{Duration, TimeZone, Utc};

    const PAGE: &str = r#"<html><body class="collection">
        <main><ul class="product-grid">
          <li class="product-card"><a href="/products/a-1"><img src="/a.jpg"></a><h3>Alpha</h3></li>
          <li class="product-card"><a href="/products/b-2"><img src="/b.jpg"></a><h3>Beta</h3></li>
          <li class="product-card"><a href="/products/c-3"><img src="/c.jpg"></a><h3>Gamma</h3></li>
        </ul></main></body></html>"#;

    const OTHER_PAGE: &str = r#"<html><body class="search"><div id="results">
        <p><a href="/x">x</a></p></div></body></html>"#;

    fn host() -> HostKey {
        HostKey::from_raw("www.shop.example.com")
    }

    fn update(url: &str, list: &[&str]) -> ProfileUpdate {
        ProfileUpdate {
            url: Some(url.to_string()),
            buckets: Buckets {
                list: list.iter().map(|s| s.to_string()).collect(),
                ..Buckets::default()
            },
            ..ProfileUpdate::default()
        }
    }

    #[test]
    fn test_normalize_buckets_is_idempotent() {
        let raw = Buckets {
            list: vec![
                "  ul.grid  >  li ".into(),
                "ul.grid > li".into(),
                ".css-1x2y3z".into(),
                "div[[".into(),
            ],
            broad: (0..60).map(|i| format!("#s{i} a[href]")).collect(),
            ..Buckets::default()
        };
        let once = normalize_buckets(&raw);
        assert_eq!(once.list, vec!["ul.grid > li".to_string()]);
        assert_eq!(once.broad.len(), 40);
        assert_eq!(normalize_buckets(&once), once);
    }

    #[test]
    fn test_unknown_host_gets_empty_profile() {
        let store = ProfileStore::in_memory();
        let best = store.get_best_profile(&host(), "https://shop.example.com/", PAGE);
        assert!(best.profile.is_none());
        assert!(best.buckets.is_empty());
        assert_eq!(best.score, 0);
    }

    #[test]
    fn test_upsert_creates_predicate_and_enriches() {
        let mut store = ProfileStore::in_memory();
        let profile = store
            .upsert_profile(
                &host(),
                update(
                    "https://shop.example.com/collections/shirts?q=red&page=2",
                    &["li.product-card"],
                ),
                PAGE,
                RunMetrics { items: 3 },
            )
            .unwrap();

        assert_eq!(profile.id, "collections|ld0-0");
        assert_eq!(
            profile.match_predicate.path_regex.as_deref(),
            Some("(?i)^/collections(/|$)")
        );
        assert_eq!(profile.match_predicate.query_keys, vec!["q".to_string()]);
        assert_eq!(profile.buckets.list, vec!["li.product-card".to_string()]);
        assert!(!profile.buckets.candidates.is_empty());
        assert_eq!(profile.metrics.runs, 1);
        assert_eq!(profile.metrics.avg_items, 3);
    }

    #[test]
    fn test_best_profile_returns_capped_superset_of_upsert() {
        let mut store = ProfileStore::in_memory();
        let url = "https://shop.example.com/collections/all";
        let nth = |parent: &str, n: usize| -> Vec<String> {
            (1..=n).map(|i| format!("{parent} > li:nth-child({i})")).collect()
        };
        let written = Buckets {
            list: nth("ul.product-grid", 25),
            anchors: nth("ol.links", 5),
            containers: nth("div.shelf", 5),
            broad: nth("section.rows", 5),
            candidates: nth("ul.cards", 5),
        };
        let update = ProfileUpdate {
            url: Some(url.to_string()),
            buckets: written.clone(),
            ..ProfileUpdate::default()
        };
        store
            .upsert_profile(&host(), update, PAGE, RunMetrics { items: 3 })
            .unwrap();

        let best = store.get_best_profile(&host(), url, PAGE);
        assert_eq!(best.score, 5);
        for kind in BucketKind::ORDER {
            let got = best.buckets.get(kind);
            assert!(got.len() <= kind.cap());
            for selector in written.get(kind).iter().take(kind.cap()) {
                assert!(got.contains(selector), "{kind:?} lost {selector}");
            }
        }
        assert_eq!(best.buckets.list.len(), 20);
        assert_eq!(best.buckets.list, written.list[..20].to_vec());
    }

    #[test]
    fn test_path_match_ignores_case() {
        let mut store = ProfileStore::in_memory();
        store
            .upsert_profile(
                &host(),
                update("https://shop.example.com/collections/all", &["li.product-card"]),
                PAGE,
                RunMetrics { items: 3 },
            )
            .unwrap();
        let best = store.get_best_profile(&host(), "https://shop.example.com/Collections/All", OTHER_PAGE);
        assert_eq!(best.score, 2);
    }

    #[test]
    fn test_list_only_changes_on_successful_runs() {
        let mut store = ProfileStore::in_memory();
        let url = "https://shop.example.com/collections/all";
        store
            .upsert_profile(&host(), update(url, &["li.product-card"]), PAGE, RunMetrics { items: 3 })
            .unwrap();
        let profile = store
            .upsert_profile(&host(), update(url, &["div.nope"]), PAGE, RunMetrics { items: 0 })
            .unwrap();
        assert_eq!(profile.buckets.list, vec!["li.product-card".to_string()]);
        assert_eq!(profile.metrics.runs, 2);
        assert_eq!(profile.metrics.avg_items, 2);

        let profile = store
            .upsert_profile(&host(), update(url, &["ul.product-grid > li"]), PAGE, RunMetrics { items: 3 })
            .unwrap();
        assert_eq!(
            profile.buckets.list,
            vec!["ul.product-grid > li".to_string(), "li.product-card".to_string()]
        );
    }

    #[test]
    fn test_best_profile_prefers_template_and_path() {
        let mut store = ProfileStore::in_memory();
        store
            .upsert_profile(
                &host(),
                update("https://shop.example.com/search?q=x", &["#results p"]),
                OTHER_PAGE,
                RunMetrics { items: 1 },
            )
            .unwrap();
        store
            .upsert_profile(
                &host(),
                update("https://shop.example.com/collections/all", &["li.product-card"]),
                PAGE,
                RunMetrics { items: 3 },
            )
            .unwrap();

        let best = store.get_best_profile(&host(), "https://shop.example.com/collections/new", PAGE);
        assert_eq!(best.buckets.list, vec!["li.product-card".to_string()]);
        assert_eq!(best.score, 5);

        let best = store.get_best_profile(&host(), "https://shop.example.com/search?q=y", OTHER_PAGE);
        assert_eq!(best.buckets.list, vec!["#results p".to_string()]);
        assert_eq!(best.score, 6);
    }

    #[test]
    fn test_ties_keep_first_seen_profile() {
        let mut store = ProfileStore::in_memory();
        for id in ["first", "second"] {
            let mut u = update("https://shop.example.com/", &[id]);
            u.id = Some(id.to_string());
            store.upsert_profile(&host(), u, PAGE, RunMetrics { items: 1 }).unwrap();
        }
        let best = store.get_best_profile(&host(), "https://shop.example.com/", PAGE);
        assert_eq!(best.profile.map(|p| p.id), Some("first".to_string()));
    }

    #[test]
    fn test_least_recently_seen_profile_is_evicted() {
        let mut store = ProfileStore::in_memory();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        for i in 0..8 {
            let mut u = update("https://shop.example.com/", &["li"]);
            u.id = Some(format!("p{i}"));
            store
                .upsert_profile_at(&host(), u, PAGE, RunMetrics { items: 1 }, start + Duration::hours(i))
                .unwrap();
        }
        // refresh p0 so p1 becomes the oldest
        let mut u = update("https://shop.example.com/", &["li"]);
        u.id = Some("p0".into());
        store
            .upsert_profile_at(&host(), u, PAGE, RunMetrics { items: 1 }, start + Duration::hours(10))
            .unwrap();

        let mut u = update("https://shop.example.com/", &["li"]);
        u.id = Some("p8".into());
        store
            .upsert_profile_at(&host(), u, PAGE, RunMetrics { items: 1 }, start + Duration::hours(11))
            .unwrap();

        let ids: Vec<&str> = store.profiles(&host()).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 8);
        assert!(ids.contains(&"p0"));
        assert!(!ids.contains(&"p1"));
        assert!(ids.contains(&"p8"));
    }

    #[test]
    fn test_failed_write_is_retryable_and_keeps_memory() {
        let backend = MemoryStore::new();
        let mut store = ProfileStore::open(backend.clone()).unwrap();
        backend.fail_writes(true);

        let err = store
            .upsert_profile(
                &host(),
                update("https://shop.example.com/", &["li.product-card"]),
                PAGE,
                RunMetrics { items: 3 },
            )
            .unwrap_err();
        assert!(matches!(err, ListwiseError::Persist { .. }));
        assert!(err.is_retryable());
        assert!(store.is_dirty());
        assert_eq!(store.profiles(&host()).len(), 1);
        assert!(backend.snapshot().is_empty());

        backend.fail_writes(false);
        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert_eq!(backend.snapshot().len(), 1);
    }

    #[test]
    fn test_local_file_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profiles.json");

        let mut store = ProfileStore::open(LocalFsStore::with_path(&path)).unwrap();
        store
            .upsert_profile(
                &host(),
                update("https://shop.example.com/collections/all", &["li.product-card"]),
                PAGE,
                RunMetrics { items: 3 },
            )
            .unwrap();
        assert!(path.exists());

        let reopened = ProfileStore::open(LocalFsStore::with_path(&path)).unwrap();
        assert_eq!(reopened.hosts(), vec![HostKey("shop.example.com".into())]);
        assert_eq!(
            reopened.profiles(&host())[0].buckets.list,
            vec!["li.product-card".to_string()]
        );

        std::fs::write(&path, "{ definitely not json").unwrap();
        let recovered = ProfileStore::open(LocalFsStore::with_path(&path)).unwrap();
        assert!(recovered.hosts().is_empty());
    }

    #[test]
    fn test_remove_host_and_clear() {
        let backend = MemoryStore::new();
        let mut store = ProfileStore::open(backend.clone()).unwrap();
        store
            .upsert_profile(&host(), update("https://shop.example.com/", &["li"]), PAGE, RunMetrics { items: 1 })
            .unwrap();
        assert!(store.remove_host(&host()).unwrap());
        assert!(!store.remove_host(&host()).unwrap());
        assert!(backend.snapshot().is_empty());

        store
            .upsert_profile(&host(), update("https://shop.example.com/", &["li"]), PAGE, RunMetrics { items: 1 })
            .unwrap();
        store.clear().unwrap();
        assert!(store.hosts().is_empty());
        assert_eq!(backend.writes(), 4);
    }
}
