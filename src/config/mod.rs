//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;

use crate::application::{pipeline::RuntimeMode, token::SigningKey};

pub use cli::{CacheCommand, CliArgs, Command, GlobalOverrides, InspectArgs, TokenArgs, TokenKind};

/// `frugal.toml` (or any format `config` understands) in the working directory,
/// then an uncommitted `frugal-local.toml` on top.
const PROJECT_CONFIG_BASENAME: &str = "frugal";
const LOCAL_CONFIG_BASENAME: &str = "frugal-local";
const DEFAULT_TOKEN_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RESPONSE_LIMIT: usize = 1000;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub runtime: RuntimeSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    /// Extra per-target directives such as `frugal::cache=debug`.
    pub scopes: Vec<Directive>,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub mode: RuntimeMode,
    pub signing_key: Option<SigningKey>,
    pub token_timeout: Duration,
    pub build_config_id: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub response_limit: usize,
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(PROJECT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FRUGAL").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_global_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    runtime: RawRuntimeSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(mode) = overrides.mode.as_ref() {
            self.runtime.mode = Some(mode.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            runtime,
            cache,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            runtime: build_runtime_settings(runtime)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    let scopes = logging
        .scopes
        .iter()
        .map(|scope| {
            Directive::from_str(scope.trim()).map_err(|err| {
                LoadError::invalid("logging.scopes", format!("`{scope}`: {err}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoggingSettings {
        level,
        format,
        scopes,
    })
}

fn build_runtime_settings(runtime: RawRuntimeSettings) -> Result<RuntimeSettings, LoadError> {
    let mode = match runtime.mode.as_deref().map(str::trim) {
        None | Some("") | Some("production") => RuntimeMode::Production,
        Some("watch") => RuntimeMode::Watch,
        Some(other) => {
            return Err(LoadError::invalid(
                "runtime.mode",
                format!("expected `production` or `watch`, got `{other}`"),
            ));
        }
    };

    let signing_key = runtime
        .signing_key
        .filter(|value| !value.trim().is_empty())
        .map(|value| SigningKey::import(&value))
        .transpose()
        .map_err(|err| LoadError::invalid("runtime.signing_key", err.to_string()))?;

    let timeout_ms = runtime
        .token_timeout_ms
        .unwrap_or(DEFAULT_TOKEN_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "runtime.token_timeout_ms",
            "must be greater than zero",
        ));
    }

    let build_config_id = runtime
        .build_config_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| format!("frugal-{}", env!("CARGO_PKG_VERSION")));

    Ok(RuntimeSettings {
        mode,
        signing_key,
        token_timeout: Duration::from_millis(timeout_ms),
        build_config_id,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let response_limit = cache.response_limit.unwrap_or(DEFAULT_RESPONSE_LIMIT);
    if response_limit == 0 {
        return Err(LoadError::invalid(
            "cache.response_limit",
            "must be greater than zero",
        ));
    }

    let snapshot_path = cache
        .snapshot_path
        .filter(|path| !path.as_os_str().is_empty());

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        response_limit,
        snapshot_path,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
    scopes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRuntimeSettings {
    mode: Option<String>,
    signing_key: Option<String>,
    token_timeout_ms: Option<u64>,
    build_config_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    response_limit: Option<usize>,
    snapshot_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests;
