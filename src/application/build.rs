//! Ahead-of-time build of every static route into the response cache.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cache::{CachedResponse, ResponseCache};

use super::{error::ProducerError, page::Page, pipeline::RouteTable};

#[derive(Debug, Default, Clone, Serialize)]
pub struct BuildReport {
    /// Paths built and stored, in build order.
    pub built: Vec<String>,
    /// Paths whose page returned no response.
    pub skipped: Vec<String>,
    /// Routes left to request time.
    pub dynamic_routes: Vec<String>,
    pub elapsed_ms: u128,
}

/// Build every enumerated path of every static route and add it to `cache`.
/// Stops at the first author error.
#[instrument(skip_all, fields(routes = routes.routes().len()))]
pub async fn build_static(
    routes: &RouteTable,
    cache: &ResponseCache,
) -> Result<BuildReport, ProducerError> {
    let started = Instant::now();
    let mut report = BuildReport::default();

    for route in routes.routes() {
        if let Page::Dynamic(_) = route.page().as_ref() {
            report.dynamic_routes.push(route.page().route().to_string());
            continue;
        }

        let producer = route.producer();
        for params in producer.get_path_params().await? {
            let path = route.page().compile_path(&params)?;
            match producer.build(params).await? {
                Some(generated) => {
                    let rendered = CachedResponse::from_generated(&generated)?;
                    cache.add(rendered);
                    report.built.push(path);
                }
                None => {
                    warn!(route = route.page().route(), path = %path, "skipped path without response");
                    report.skipped.push(path);
                }
            }
        }
    }

    report.elapsed_ms = started.elapsed().as_millis();
    info!(
        built = report.built.len(),
        skipped = report.skipped.len(),
        dynamic = report.dynamic_routes.len(),
        elapsed_ms = report.elapsed_ms as u64,
        "static build finished"
    );
    Ok(report)
}
