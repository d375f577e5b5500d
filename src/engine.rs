//! Extraction runs.
//!
//! [`run_snapshot`] is one synchronous pass over already-rendered HTML:
//! fingerprint, mine, profile lookup, cascade, post-process, persist.
//! [`Engine`] drives the same pass behind the rendering and classification
//! collaborators and serializes runs against one host.

use crate::config::{EngineOptions, KindDefault, KindDefaults};
use crate::services::store::ProfileStore;
use crate::tools::extract::{compose_buckets, compose_fields, extract_doc, CascadeOutcome, Strategy};
use crate::tools::fingerprint::{fingerprint, fingerprint_doc};
use crate::tools::mine::mine_doc;
use crate::tools::post::post_process;
use crate::{error::*, types::*};
use async_trait::async_trait;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use url::Url;

/* ---------------- collaborators ---------------- */

/// Both snapshots of one rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    /// Markup captured before the page settled.
    pub html: String,
    /// Markup after scripts and lazy content settled.
    pub final_html: String,
}

/// Fetches and settles a live page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn render(&self, url: &str) -> Result<RenderedPage>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: String,
    pub confidence: f64,
}

/// Assigns a page to a platform family.
pub trait PageClassifier: Send + Sync {
    fn classify(&self, html: &str, url: &str) -> Option<Classification>;
}

/// Classifier that never recognizes anything.
pub struct NoClassifier;

impl PageClassifier for NoClassifier {
    fn classify(&self, _html: &str, _url: &str) -> Option<Classification> {
        None
    }
}

/// Serves pages captured earlier, keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRenderer {
    pages: HashMap<String, RenderedPage>,
}

impl SnapshotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: RenderedPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[async_trait]
impl PageRenderer for SnapshotRenderer {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn render(&self, url: &str) -> Result<RenderedPage> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ListwiseError::render(url, "no snapshot for url"))
    }
}

/* ---------------- run report ---------------- */

/// One page to run: settled HTML, optionally the early snapshot and the
/// default bundle of its classified kind.
#[derive(Debug, Clone, Default)]
pub struct SnapshotInput {
    pub url: String,
    pub html: String,
    pub early_html: Option<String>,
    pub kind_default: Option<KindDefault>,
}

impl SnapshotInput {
    pub fn new(url: &str, html: &str) -> Self {
        Self {
            url: url.to_string(),
            html: html.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub host: HostKey,
    pub fingerprint: String,
    pub profile_id: Option<String>,
    pub profile_score: u32,
    pub strategy: Strategy,
    /// Items out of the cascade, before post-processing.
    pub raw_items: usize,
    pub items: usize,
    pub mining_source: MiningSource,
    pub confidence: f64,
    /// Whether the early snapshot supplied the items.
    pub used_early_html: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PersistStatus {
    Saved {
        #[serde(rename = "profileId")]
        profile_id: String,
    },
    Skipped,
    Failed { error: String, retryable: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub items: Vec<ExtractedItem>,
    pub summary: RunSummary,
    pub persist: PersistStatus,
}

/* ---------------- single run ---------------- */

/// Everything read from the store before extraction starts.
struct RunPlan {
    host: HostKey,
    template: String,
    best: BestProfile,
}

/// Extraction results and the update they imply.
struct RunOutput {
    items: Vec<ExtractedItem>,
    summary: RunSummary,
    update: ProfileUpdate,
}

/// Run one snapshot end to end against `store`.
pub fn run_snapshot(
    store: &mut ProfileStore,
    input: &SnapshotInput,
    opts: &EngineOptions,
) -> Result<RunReport> {
    let started = Instant::now();
    let doc = Html::parse_document(&input.html);
    let plan = plan_run(store, input, fingerprint_doc(&doc))?;
    let output = execute_run(plan, input, &doc, opts, started);
    Ok(learn(store, output, input, opts))
}

fn host_of(url: &str) -> Result<HostKey> {
    let parsed = Url::parse(url).map_err(|_| ListwiseError::InvalidUrl(url.to_string()))?;
    HostKey::from_url(&parsed).ok_or(ListwiseError::MissingHost)
}

fn plan_run(store: &ProfileStore, input: &SnapshotInput, template: String) -> Result<RunPlan> {
    let host = host_of(&input.url)?;
    let best = store.best_profile_for(&host, &input.url, &template);
    debug!(
        host = %host,
        profile = ?best.profile.as_ref().map(|p| &p.id),
        score = best.score,
        "profile lookup"
    );
    Ok(RunPlan {
        host,
        template,
        best,
    })
}

fn execute_run(
    plan: RunPlan,
    input: &SnapshotInput,
    doc: &Html,
    opts: &EngineOptions,
    started: Instant,
) -> RunOutput {
    let mined = mine_doc(doc, &input.html, &input.url);
    let mined_buckets = mined.to_buckets();

    let (kind_buckets, kind_fields) = match &input.kind_default {
        Some(kind) => (kind.to_buckets(), kind.fields.clone()),
        None => (Buckets::default(), FieldRules::new()),
    };
    let learned_fields = plan
        .best
        .profile
        .as_ref()
        .map(|p| p.fields.clone())
        .unwrap_or_default();

    let buckets = compose_buckets(&[&plan.best.buckets, &mined_buckets, &kind_buckets]);
    let fields = compose_fields(&[&mined.fields, &kind_fields, &learned_fields]);

    let mut outcome = extract_doc(doc, &buckets, &fields, opts.max_cards);
    let mut used_early_html = false;
    if outcome.items.is_empty() {
        if let Some(early) = &input.early_html {
            let early_doc = Html::parse_document(early);
            let retry: CascadeOutcome = extract_doc(&early_doc, &buckets, &fields, opts.max_cards);
            if !retry.items.is_empty() {
                debug!(items = retry.items.len(), "early snapshot produced items");
                outcome = retry;
                used_early_html = true;
            }
        }
    }

    let raw_items = outcome.items.len();
    let items = post_process(outcome.items, &input.url);

    let mut list = outcome.strategy.learned_selectors();
    list.extend(mined_buckets.list.iter().cloned());
    let profile_id = plan.best.profile.map(|p| p.id);
    let update = ProfileUpdate {
        // feedback goes to the profile that drove this run
        id: profile_id.clone().filter(|_| plan.best.score > 0),
        url: Some(input.url.clone()),
        buckets: Buckets {
            list,
            ..mined_buckets
        },
        fields: if items.is_empty() {
            FieldRules::new()
        } else {
            kind_fields
        },
    };

    let summary = RunSummary {
        host: plan.host,
        fingerprint: plan.template,
        profile_id,
        profile_score: plan.best.score,
        strategy: outcome.strategy,
        raw_items,
        items: items.len(),
        mining_source: mined.source,
        confidence: mined.confidence,
        used_early_html,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    RunOutput {
        items,
        summary,
        update,
    }
}

fn learn(
    store: &mut ProfileStore,
    output: RunOutput,
    input: &SnapshotInput,
    opts: &EngineOptions,
) -> RunReport {
    let RunOutput {
        items,
        summary,
        update,
    } = output;
    let persist = if !opts.learn {
        PersistStatus::Skipped
    } else {
        let metrics = RunMetrics { items: items.len() };
        match store.upsert_profile(&summary.host, update, &input.html, metrics) {
            Ok(profile) => PersistStatus::Saved {
                profile_id: profile.id,
            },
            Err(e) => {
                warn!(host = %summary.host, error = %e, "profile update not persisted");
                PersistStatus::Failed {
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                }
            }
        }
    };
    info!(
        host = %summary.host,
        strategy = %summary.strategy.label(),
        raw = summary.raw_items,
        items = summary.items,
        elapsed_ms = summary.elapsed_ms,
        "run finished"
    );
    RunReport {
        items,
        summary,
        persist,
    }
}

/* ---------------- async engine ---------------- */

/// One async mutex per host, created on first use.
#[derive(Debug, Default)]
pub struct HostLocks {
    locks: std::sync::Mutex<HashMap<HostKey, Arc<Mutex<()>>>>,
}

impl HostLocks {
    pub async fn acquire(&self, host: &HostKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(host.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Renders, classifies and extracts pages, learning into a shared store.
pub struct Engine {
    store: Mutex<ProfileStore>,
    renderer: Box<dyn PageRenderer>,
    classifier: Box<dyn PageClassifier>,
    kinds: KindDefaults,
    locks: HostLocks,
    pub opts: EngineOptions,
}

impl Engine {
    pub fn new(store: ProfileStore, renderer: impl PageRenderer + 'static) -> Self {
        Self {
            store: Mutex::new(store),
            renderer: Box::new(renderer),
            classifier: Box::new(NoClassifier),
            kinds: KindDefaults::default(),
            locks: HostLocks::default(),
            opts: EngineOptions::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl PageClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_kinds(mut self, kinds: KindDefaults) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_options(mut self, opts: EngineOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Render `url` and run it. Runs on the same host wait for each other;
    /// the store itself is only locked for lookup and update.
    pub async fn run(&self, url: &str) -> Result<RunReport> {
        let host = host_of(url)?;
        let _guard = self.locks.acquire(&host).await;

        let page = self.renderer.render(url).await?;
        debug!(renderer = self.renderer.name(), url, "rendered");
        let input = SnapshotInput {
            url: url.to_string(),
            kind_default: self.kind_default(&page.final_html, url),
            early_html: Some(page.html).filter(|h| !h.trim().is_empty()),
            html: page.final_html,
        };
        self.run_input(&input).await
    }

    /// Run an already-rendered snapshot.
    pub async fn run_input(&self, input: &SnapshotInput) -> Result<RunReport> {
        let started = Instant::now();
        let template = fingerprint(&input.html);
        let plan = {
            let store = self.store.lock().await;
            plan_run(&store, input, template)?
        };
        // parsed documents are not `Send`; keep them out of await points
        let output = {
            let doc = Html::parse_document(&input.html);
            execute_run(plan, input, &doc, &self.opts, started)
        };
        let mut store = self.store.lock().await;
        Ok(learn(&mut store, output, input, &self.opts))
    }

    /// Default bundle of the page's kind when the classifier is confident.
    fn kind_default(&self, html: &str, url: &str) -> Option<KindDefault> {
        let found = self.classifier.classify(html, url)?;
        if found.confidence < self.opts.min_classifier_confidence {
            debug!(kind = %found.kind, confidence = found.confidence, "classification ignored");
            return None;
        }
        self.kinds.get(&found.kind).cloned()
    }

    /// Retry a store write that failed during an earlier run.
    pub async fn flush(&self) -> Result<()> {
        self.store.lock().await.flush()
    }

    /// Read or administer the store.
    pub async fn with_store<R>(&self, f: impl FnOnce(&mut ProfileStore) -> R) -> R {
        let mut store = self.store.lock().await;
        f(&mut store)
    }
}
