//! Response cache configuration, read from the `[cache]` section of `frugal.toml`.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_RESPONSE_LIMIT: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store built responses. When off, every request is built just in time.
    pub enabled: bool,
    /// Maximum responses held before the least recently used one is evicted.
    pub response_limit: usize,
    /// Where `persist` writes and `load` reads the cache snapshot.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            response_limit: DEFAULT_RESPONSE_LIMIT,
            snapshot_path: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            response_limit: settings.response_limit,
            snapshot_path: settings.snapshot_path.clone(),
        }
    }
}

impl CacheConfig {
    /// Clamped to 1 when configured as zero.
    pub fn response_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.response_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
