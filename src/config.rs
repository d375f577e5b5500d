//! Limits, engine options and per-kind default bundles.

use crate::{error::*, types::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Profiles kept per host before LRU eviction.
pub const MAX_PROFILES_PER_HOST: usize = 8;

pub const LIST_CAP: usize = 20;
pub const BUCKET_CAP: usize = 40;
pub const CANDIDATES_CAP: usize = 80;

/// Selectors tried together when no single selector of a bucket matches.
pub const COMBINED_SELECTOR_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
    /// Classifier results below this confidence contribute no default bundle.
    pub min_classifier_confidence: f64,
    /// Write run feedback back into the profile store.
    pub learn: bool,
    /// Upper bound on cards read per strategy.
    pub max_cards: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            min_classifier_confidence: 0.5,
            learn: true,
            max_cards: 400,
        }
    }
}

/// Static default selectors for one page kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindDefault {
    #[serde(default)]
    pub list: Vec<String>,
    #[serde(default)]
    pub fields: FieldRules,
}

impl KindDefault {
    pub fn to_buckets(&self) -> Buckets {
        Buckets {
            list: self.list.clone(),
            ..Buckets::default()
        }
    }
}

/// File-backed `kind -> default bundle` lookup, consumed as opaque data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindDefaults(pub BTreeMap<String, KindDefault>);

impl KindDefaults {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
            .map_err(|e| ListwiseError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn get(&self, kind: &str) -> Option<&KindDefault> {
        self.0.get(kind).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(kind))
                .map(|(_, v)| v)
        })
    }
}
