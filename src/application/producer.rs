//! Turns page operations into materialized responses.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{debug, warn};

use crate::domain::{response::ResponseValue, route::PathParams};

use super::{
    error::ProducerError,
    generated::{GeneratedResponse, ProductionContext},
    page::{BuildContext, GenerateContext, Page, PageRequest, RequestState, SessionData},
};

const METRIC_PRODUCE_MS: &str = "frugal_produce_ms";

pub struct Producer {
    page: Arc<Page>,
    context: Arc<ProductionContext>,
}

impl Producer {
    pub fn new(page: Arc<Page>, context: Arc<ProductionContext>) -> Self {
        Self { page, context }
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    /// Parameter sets a static page is built for.
    pub async fn get_path_params(&self) -> Result<Vec<PathParams>, ProducerError> {
        let Page::Static(page) = self.page.as_ref() else {
            return Err(self.dynamic_build_error());
        };
        Ok(page.get_build_paths().await?)
    }

    /// Build the path `params` compile to. `Ok(None)` when the page produced nothing.
    pub async fn build(
        &self,
        params: PathParams,
    ) -> Result<Option<GeneratedResponse>, ProducerError> {
        let path = self.page.compile_path(&params)?;
        self.build_path(path, params).await
    }

    /// Request-time production. Static pages answer read-only requests from `build`.
    pub async fn generate(
        &self,
        request: &PageRequest,
        path: &str,
        params: PathParams,
        state: &RequestState,
        session: Option<&SessionData>,
    ) -> Result<Option<GeneratedResponse>, ProducerError> {
        if self.page.as_static().is_some() && request.is_read_only() {
            debug!(
                route = self.page.route(),
                path, "read-only request on static page, building instead"
            );
            return self.build_path(path.to_string(), params).await;
        }
        self.generate_live(request, path, params, state, session)
            .await
    }

    /// Always runs the page's `generate`, bypassing the static build.
    pub async fn generate_live(
        &self,
        request: &PageRequest,
        path: &str,
        params: PathParams,
        state: &RequestState,
        session: Option<&SessionData>,
    ) -> Result<Option<GeneratedResponse>, ProducerError> {
        let started = Instant::now();
        let value = self
            .page
            .core()
            .generate(GenerateContext {
                request,
                path,
                params: &params,
                state,
                session,
            })
            .await?;
        record_produce_time("generate", started);

        Ok(self.materialize("generate", path.to_string(), params, value))
    }

    async fn build_path(
        &self,
        path: String,
        params: PathParams,
    ) -> Result<Option<GeneratedResponse>, ProducerError> {
        let Page::Static(page) = self.page.as_ref() else {
            return Err(self.dynamic_build_error());
        };

        let started = Instant::now();
        let value = page
            .build(BuildContext {
                path: &path,
                params: &params,
            })
            .await?;
        record_produce_time("build", started);

        Ok(self.materialize("build", path, params, value))
    }

    fn materialize(
        &self,
        operation: &'static str,
        path: String,
        params: PathParams,
        value: Option<ResponseValue>,
    ) -> Option<GeneratedResponse> {
        let Some(value) = value else {
            warn!(
                route = self.page.route(),
                path = %path,
                operation,
                "page returned no response"
            );
            return None;
        };
        Some(
            self.context
                .materialize(Arc::clone(&self.page), path, params, value),
        )
    }

    fn dynamic_build_error(&self) -> ProducerError {
        ProducerError::DynamicBuild {
            route: self.page.route().to_string(),
        }
    }
}

fn record_produce_time(operation: &'static str, started: Instant) {
    histogram!(METRIC_PRODUCE_MS, "operation" => operation)
        .record(started.elapsed().as_secs_f64() * 1000.0);
}
