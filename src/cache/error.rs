use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to access cache snapshot `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache snapshot is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported cache snapshot version {0}")]
    Version(u32),
    #[error("invalid cached response for `{path}`: {reason}")]
    InvalidEntry { path: String, reason: String },
}

impl CacheError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid_entry(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
