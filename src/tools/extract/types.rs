use crate::types::{BucketKind, ExtractedItem};
use serde::{Deserialize, Serialize};

/// What produced a cascade's items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Strategy {
    /// One selector of a bucket on its own.
    Selector { bucket: BucketKind, selector: String },
    /// The first selectors of a bucket joined into one query.
    Combined {
        bucket: BucketKind,
        selectors: Vec<String>,
    },
    /// Embedded JSON-LD, used when no bucket matched.
    StructuredData,
    None,
}

impl Strategy {
    /// Selectors worth remembering as `list` entries after a good run.
    pub fn learned_selectors(&self) -> Vec<String> {
        match self {
            Strategy::Selector { selector, .. } => vec![selector.clone()],
            Strategy::Combined { selectors, .. } => selectors.clone(),
            Strategy::StructuredData | Strategy::None => Vec::new(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Strategy::Selector { bucket, selector } => format!("{}:{selector}", bucket.name()),
            Strategy::Combined { bucket, selectors } => {
                format!("{}:combined({})", bucket.name(), selectors.len())
            }
            Strategy::StructuredData => "structuredData".into(),
            Strategy::None => "none".into(),
        }
    }
}

/// Items surviving the cascade pre-filter plus the strategy that found them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub items: Vec<ExtractedItem>,
    pub strategy: Strategy,
}

impl CascadeOutcome {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            strategy: Strategy::None,
        }
    }
}
