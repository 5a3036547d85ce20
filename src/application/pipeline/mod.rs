//! Regeneration pipeline: decides per request whether to serve, rebuild or generate.
//!
//! A static route runs, in order: force-generate, refresh, watch rebuild,
//! serve-from-cache and just-in-time build. A dynamic route only generates.
//! Strict-path checks happen in [`RouteTable`] before any stage runs.

mod marker;
mod routes;
mod stage;
mod stages;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    application::token::TokenCodec,
    cache::{CacheConfig, ResponseCache},
    config::Settings,
};

pub use marker::{
    FORCE_GENERATE_COOKIE, FORCE_GENERATE_HEADER, FORCE_REFRESH_HEADER, FORCE_REFRESH_PARAM,
    MarkerSource, force_generate_marker, refresh_marker,
};
pub use routes::{Route, RouteTable};
pub use stage::{Next, Pipeline, Stage, StageContext, StageResult};
pub use stages::{ForceGenerate, Generate, JustInTimeBuild, Refresh, ServeFromCache, WatchRebuild};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    #[default]
    Production,
    /// Live development: every request regenerates.
    Watch,
}

impl RuntimeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeMode::Production => "production",
            RuntimeMode::Watch => "watch",
        }
    }
}

/// Collaborators shared by every route. Without a codec no marker is ever valid;
/// without a cache every read-only request is built just in time.
#[derive(Default)]
pub struct PipelineServices {
    mode: RuntimeMode,
    codec: Option<TokenCodec>,
    cache: Option<Arc<ResponseCache>>,
    snapshot_path: Option<PathBuf>,
}

impl PipelineServices {
    pub fn new(mode: RuntimeMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Services as configured: a codec when a signing key is set, and a cache
    /// with its snapshot path unless the cache is disabled.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut services = Self::new(settings.runtime.mode);
        if let Some(key) = &settings.runtime.signing_key {
            services = services.with_codec(
                TokenCodec::new(key.clone()).with_timeout(settings.runtime.token_timeout),
            );
        }
        let cache_config = CacheConfig::from(&settings.cache);
        if cache_config.enabled {
            services = services.with_cache(Arc::new(ResponseCache::new(&cache_config)));
            if let Some(path) = cache_config.snapshot_path {
                services = services.with_snapshot_path(path);
            }
        }
        services
    }

    pub fn with_codec(mut self, codec: TokenCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// File the cache is restored from at startup and written to at shutdown.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn codec(&self) -> Option<&TokenCodec> {
        self.codec.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}
