//! Subscriber and metric setup, driven only by the settings passed in.

use std::io;
use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRICS_DESCRIBED: Once = Once::new();

/// Install the process subscriber. Logs go to stderr; stdout is left to command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let output = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter(logging))
        .with(ErrorLayer::default())
        .with(output)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

/// `RUST_LOG` first, then the configured level as default, then per-scope directives.
fn filter(logging: &LoggingSettings) -> EnvFilter {
    let base = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    logging
        .scopes
        .iter()
        .cloned()
        .fold(base, EnvFilter::add_directive)
}

fn describe_metrics() {
    METRICS_DESCRIBED.call_once(|| {
        let counters = [
            ("frugal_cache_hit_total", "Response-cache lookups that found an entry."),
            ("frugal_cache_miss_total", "Response-cache lookups that found nothing."),
            (
                "frugal_cache_stale_total",
                "Cached responses past their freshness budget at request time.",
            ),
            (
                "frugal_cache_evict_total",
                "Responses dropped to stay within the response limit.",
            ),
            (
                "frugal_pipeline_stage_total",
                "Requests answered, labelled by the stage that answered.",
            ),
        ];
        for (name, help) in counters {
            describe_counter!(name, Unit::Count, help);
        }
        describe_histogram!(
            "frugal_produce_ms",
            Unit::Milliseconds,
            "Latency of page build and generate calls."
        );
    });
}
