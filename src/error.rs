use std::path::PathBuf;
use thiserror::Error;

use crate::tools::select::SelectorError;

pub type Result<T> = std::result::Result<T, ListwiseError>;

#[derive(Debug, Error)]
pub enum ListwiseError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("missing host in url")]
    MissingHost,

    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// Durable write of the profile store failed. The in-memory state is kept,
    /// so `ProfileStore::flush` can retry.
    #[error("failed to persist profile store to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("profile store at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("render failed for {url}: {reason}")]
    Render { url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ListwiseError {
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    pub fn render(url: &str, reason: impl Into<String>) -> Self {
        Self::Render {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persist { .. } | Self::Render { .. })
    }
}
