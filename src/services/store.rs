//! Host-scoped profile store.
//!
//! Profiles live in one JSON document keyed by canonical host. The whole
//! document is rewritten after every mutation. Callers serialize runs per
//! host; the store itself does no locking.

use crate::config::MAX_PROFILES_PER_HOST;
use crate::{dedupe, merge};
use crate::error::*;
use crate::tools::fingerprint::{fingerprint, template_family};
use crate::tools::mine::mine_light;
use crate::tools::select::normalize_selector;
use crate::types::*;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

/// Query keys worth remembering in a new profile's match predicate.
const QUERY_HINT_KEYS: &[&str] = &[
    "q", "query", "search", "s", "k", "keyword", "category", "cat", "c", "collection", "dept",
];

/// Profiles of one host, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostProfiles {
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

pub type HostMap = BTreeMap<String, HostProfiles>;

/* ---------------- storage ---------------- */

/// Durable home of the host map.
pub trait ProfileStorage: Send + Sync {
    fn load(&self) -> Result<HostMap>;
    fn save(&self, hosts: &HostMap) -> Result<()>;
    fn describe(&self) -> String;
}

/// JSON file on local disk.
pub struct LocalFsStore {
    path: PathBuf,
}

impl LocalFsStore {
    /// `<data_local_dir>/profiles.json` for this user.
    pub fn new() -> Result<Self> {
        let proj = ProjectDirs::from("io", "listwise", "listwise")
            .ok_or_else(|| ListwiseError::Config("could not resolve data dir".into()))?;
        Ok(Self {
            path: proj.data_local_dir().join("profiles.json"),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStorage for LocalFsStore {
    fn load(&self) -> Result<HostMap> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HostMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(HostMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| ListwiseError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write to a sibling temp file, then rename over the target.
    fn save(&self, hosts: &HostMap) -> Result<()> {
        let persist = |e: io::Error| ListwiseError::persist(&self.path, e);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(persist)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let file = fs::File::create(&tmp).map_err(persist)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, hosts).map_err(|e| persist(e.into()))?;
        writer.flush().map_err(persist)?;
        fs::rename(&tmp, &self.path).map_err(persist)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    hosts: Mutex<HostMap>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

/// In-process storage; clones share the same document.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts(hosts: HostMap) -> Self {
        let store = Self::default();
        *store.lock() = hosts;
        store
    }

    /// Make every following `save` fail with a persistence error.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> HostMap {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostMap> {
        self.inner.hosts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProfileStorage for MemoryStore {
    fn load(&self) -> Result<HostMap> {
        Ok(self.snapshot())
    }

    fn save(&self, hosts: &HostMap) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(ListwiseError::persist(
                "memory",
                io::Error::new(io::ErrorKind::Other, "writes disabled"),
            ));
        }
        *self.lock() = hosts.clone();
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

/* ---------------- bucket normalization ---------------- */

/// Trim, strip generated classes, dedupe and cap every bucket. Idempotent.
pub fn normalize_buckets(buckets: &Buckets) -> Buckets {
    let mut out = Buckets::default();
    for kind in BucketKind::ORDER {
        let cleaned: Vec<String> = dedupe!(buckets.get(kind).iter(), |s: &String| {
            normalize_selector(s.trim())
        });
        *out.get_mut(kind) = cleaned.into_iter().take(kind.cap()).collect();
    }
    out
}

/// Merge incoming buckets over existing ones, incoming first. `list` only
/// changes when the run produced items.
pub fn merge_buckets(existing: &Buckets, incoming: &Buckets, succeeded: bool) -> Buckets {
    let mut merged = Buckets::default();
    for kind in BucketKind::ORDER {
        let old = existing.get(kind).iter().cloned();
        *merged.get_mut(kind) = if kind == BucketKind::List && !succeeded {
            old.collect()
        } else {
            merge!(incoming.get(kind).iter().cloned(), old)
        };
    }
    normalize_buckets(&merged)
}

/* ---------------- profile store ---------------- */

/// In-memory host map with write-through persistence.
pub struct ProfileStore {
    storage: Box<dyn ProfileStorage>,
    hosts: HostMap,
    dirty: bool,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore")
            .field("storage", &self.storage.describe())
            .field("hosts", &self.hosts.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl ProfileStore {
    /// Load the host map. A corrupt document resets to empty.
    pub fn open(storage: impl ProfileStorage + 'static) -> Result<Self> {
        let hosts = match storage.load() {
            Ok(hosts) => hosts,
            Err(ListwiseError::Corrupt { path, reason }) => {
                warn!(path = %path.display(), %reason, "profile store corrupt; starting empty");
                HostMap::new()
            }
            Err(e) => return Err(e),
        };
        debug!(storage = %storage.describe(), hosts = hosts.len(), "profile store loaded");
        Ok(Self {
            storage: Box::new(storage),
            hosts,
            dirty: false,
        })
    }

    /// Store backed by the default profile file.
    pub fn open_default() -> Result<Self> {
        Self::open(LocalFsStore::new()?)
    }

    pub fn in_memory() -> Self {
        Self {
            storage: Box::new(MemoryStore::new()),
            hosts: HostMap::new(),
            dirty: false,
        }
    }

    /// Best-matching profile for a page, with its normalized buckets.
    pub fn get_best_profile(&self, host: &HostKey, url: &str, html: &str) -> BestProfile {
        self.best_profile_for(host, url, &fingerprint(html))
    }

    /// Same as [`get_best_profile`](Self::get_best_profile) with a fingerprint
    /// the caller already computed.
    pub fn best_profile_for(&self, host: &HostKey, url: &str, template: &str) -> BestProfile {
        let Some(entry) = self.hosts.get(host.as_str()) else {
            return BestProfile::default();
        };
        let parsed = Url::parse(url).ok();
        let mut best: Option<(&Profile, u32)> = None;
        for profile in &entry.profiles {
            let score = match_score(profile, parsed.as_ref(), template);
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((profile, score));
            }
        }
        match best {
            Some((profile, score)) => BestProfile {
                profile: Some(profile.clone()),
                buckets: normalize_buckets(&profile.buckets),
                score,
            },
            None => BestProfile::default(),
        }
    }

    /// Merge one run's feedback into the host's profiles and persist.
    pub fn upsert_profile(
        &mut self,
        host: &HostKey,
        update: ProfileUpdate,
        html: &str,
        metrics: RunMetrics,
    ) -> Result<Profile> {
        self.upsert_profile_at(host, update, html, metrics, Utc::now())
    }

    pub fn upsert_profile_at(
        &mut self,
        host: &HostKey,
        update: ProfileUpdate,
        html: &str,
        metrics: RunMetrics,
        now: DateTime<Utc>,
    ) -> Result<Profile> {
        let template = fingerprint(html);
        let url = update.url.as_deref().and_then(|u| Url::parse(u).ok());
        let segment = url.as_ref().and_then(first_path_segment);
        let id = update
            .id
            .clone()
            .unwrap_or_else(|| {
                format!(
                    "{}|{}",
                    segment.as_deref().unwrap_or("*"),
                    template_family(&template)
                )
            });

        let entry = self.hosts.entry(host.0.clone()).or_default();
        let idx = match entry.profiles.iter().position(|p| p.id == id) {
            Some(idx) => idx,
            None => {
                if entry.profiles.len() >= MAX_PROFILES_PER_HOST {
                    evict_least_recent(host, &mut entry.profiles);
                }
                entry.profiles.push(Profile {
                    id: id.clone(),
                    match_predicate: MatchPredicate {
                        path_regex: segment
                            .as_deref()
                            .map(|s| format!("(?i)^/{}(/|$)", regex::escape(s))),
                        query_keys: url.as_ref().map(query_hints).unwrap_or_default(),
                        template_hash: Some(template.clone()),
                    },
                    buckets: Buckets::default(),
                    fields: FieldRules::new(),
                    metrics: ProfileMetrics {
                        runs: 0,
                        avg_items: 0,
                        last_seen: now,
                    },
                });
                info!(host = %host, profile = %id, "created profile");
                entry.profiles.len() - 1
            }
        };

        let enrichment = mine_light(html);
        let mut incoming = update.buckets;
        for kind in BucketKind::ORDER {
            if kind != BucketKind::List {
                incoming.get_mut(kind).extend(enrichment.get(kind).iter().cloned());
            }
        }

        let profile = &mut entry.profiles[idx];
        profile.match_predicate.template_hash = Some(template);
        profile.buckets = merge_buckets(&profile.buckets, &incoming, metrics.items > 0);
        for (name, rule) in update.fields {
            profile.fields.insert(name, rule);
        }
        let m = &mut profile.metrics;
        m.runs += 1;
        let total = m.avg_items as f64 * (m.runs - 1) as f64 + metrics.items as f64;
        m.avg_items = (total / m.runs as f64).round() as u32;
        m.last_seen = now;
        let snapshot = profile.clone();

        self.dirty = true;
        self.persist()?;
        Ok(snapshot)
    }

    /// Retry a write that failed earlier. No-op when nothing is pending.
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn profiles(&self, host: &HostKey) -> &[Profile] {
        self.hosts
            .get(host.as_str())
            .map(|e| e.profiles.as_slice())
            .unwrap_or_default()
    }

    pub fn hosts(&self) -> Vec<HostKey> {
        self.hosts.keys().map(|h| HostKey(h.clone())).collect()
    }

    /// Drop every profile of a host. Returns whether the host was known.
    pub fn remove_host(&mut self, host: &HostKey) -> Result<bool> {
        let removed = self.hosts.remove(host.as_str()).is_some();
        if removed {
            self.dirty = true;
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.hosts.clear();
        self.dirty = true;
        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        match self.storage.save(&self.hosts) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                warn!(storage = %self.storage.describe(), error = %e, "profile store write failed");
                Err(e)
            }
        }
    }
}

/// 2 x path match + query keys present + 3 x template match.
fn match_score(profile: &Profile, url: Option<&Url>, template: &str) -> u32 {
    let predicate = &profile.match_predicate;
    let mut score = 0;
    if let (Some(pattern), Some(url)) = (&predicate.path_regex, url) {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(url.path()) => score += 2,
            Ok(_) => {}
            Err(e) => debug!(profile = %profile.id, error = %e, "invalid path regex"),
        }
    }
    if let Some(url) = url {
        let present: HashSet<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        score += predicate
            .query_keys
            .iter()
            .filter(|k| present.contains(*k))
            .count() as u32;
    }
    if predicate.template_hash.as_deref() == Some(template) {
        score += 3;
    }
    score
}

/// First path segment when it is a plain word (`collections`, `search`).
fn first_path_segment(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next()?;
    let plain = !segment.is_empty()
        && segment.chars().any(|c| c.is_ascii_alphabetic())
        && segment
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '-' || c == '_');
    plain.then(|| segment.to_ascii_lowercase())
}

fn query_hints(url: &Url) -> Vec<String> {
    let keys: Vec<String> = url
        .query_pairs()
        .map(|(k, _)| k.into_owned())
        .filter(|k| QUERY_HINT_KEYS.contains(&k.as_str()))
        .collect();
    dedupe!(keys)
}

fn evict_least_recent(host: &HostKey, profiles: &mut Vec<Profile>) {
    let victim = profiles
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| p.metrics.last_seen)
        .map(|(i, _)| i);
    if let Some(i) = victim {
        let evicted = profiles.remove(i);
        info!(host = %host, profile = %evicted.id, "evicted least recently seen profile");
    }
}
