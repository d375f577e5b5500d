//! Public facade: the exposed operations as free functions over a store.

use crate::config::{EngineOptions, KindDefaults};
use crate::engine::{run_snapshot, RunReport, SnapshotInput};
use crate::services::store::ProfileStore;
use crate::tools::mine::default_field_rules;
use crate::{error::*, types::*};
use std::time::Instant;
use tracing::{error, info};

/* ------------ mining + extraction ------------ */

/// Ranked selector proposals for one snapshot.
pub fn mine_candidates(html: &str, url: &str) -> MiningResult {
    crate::tools::mine::mine_candidates(html, url)
}

/// Raw cascade over caller-supplied buckets. Empty `fields` means the
/// built-in card rules.
pub fn extract(html: &str, buckets: &Buckets, fields: &FieldRules) -> Vec<ExtractedItem> {
    if fields.is_empty() {
        crate::tools::extract::extract(html, buckets, &default_field_rules())
    } else {
        crate::tools::extract::extract(html, buckets, fields)
    }
}

/// Full run over a saved snapshot, learning into `store` unless disabled.
pub fn extract_snapshot(
    store: &mut ProfileStore,
    input: &SnapshotInput,
    opts: &EngineOptions,
) -> Result<RunReport> {
    let start_time = Instant::now();
    let result = run_snapshot(store, input, opts);
    let duration = start_time.elapsed();
    match &result {
        Ok(report) => info!(
            url = %input.url,
            items = report.items.len(),
            "extract succeeded in {}ms",
            duration.as_millis()
        ),
        Err(e) => error!(url = %input.url, error = %e, "extract failed in {}ms", duration.as_millis()),
    }
    result
}

/// Resolve the default bundle of `kind` from a kinds file, if any.
pub fn kind_input(
    mut input: SnapshotInput,
    kind: Option<&str>,
    kinds: Option<&KindDefaults>,
) -> SnapshotInput {
    if let (Some(kind), Some(kinds)) = (kind, kinds) {
        input.kind_default = kinds.get(kind).cloned();
    }
    input
}

/* ------------ profile helpers ------------ */

pub fn get_best_profile(store: &ProfileStore, host: &str, url: &str, html: &str) -> BestProfile {
    store.get_best_profile(&HostKey::from_raw(host), url, html)
}

/// Merge an incoming update into the host's profiles. Write failures come
/// back as retryable errors.
pub fn upsert_profile(
    store: &mut ProfileStore,
    host: &str,
    incoming: ProfileUpdate,
    html: &str,
    metrics: RunMetrics,
) -> Result<Profile> {
    let host = HostKey::from_raw(host);
    let result = store.upsert_profile(&host, incoming, html, metrics);
    if let Err(e) = &result {
        error!(host = %host, error = %e, retryable = e.is_retryable(), "upsert failed");
    }
    result
}

pub fn read_profiles(store: &ProfileStore, target: &str) -> Vec<Profile> {
    store.profiles(&HostKey::from_raw(target)).to_vec()
}

pub fn list_hosts(store: &ProfileStore) -> Vec<String> {
    store.hosts().into_iter().map(|h| h.0).collect()
}

/// Delete one host's profiles, or all of them for `all`.
pub fn delete_profiles(store: &mut ProfileStore, target: &str) -> Result<bool> {
    let start_time = Instant::now();
    let result = if target == "all" {
        store.clear().map(|_| true)
    } else {
        store.remove_host(&HostKey::from_raw(target))
    };
    let duration = start_time.elapsed();
    match &result {
        Ok(removed) => info!(host = target, removed, "delete_profiles succeeded in {}ms", duration.as_millis()),
        Err(e) => error!(host = target, error = %e, "delete_profiles failed in {}ms", duration.as_millis()),
    }
    result
}
