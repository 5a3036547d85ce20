use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::{
    application::{
        error::{PipelineError, ProducerError},
        generated::ProductionContext,
        page::{Page, PageRequest, RequestState, SessionData},
        producer::Producer,
    },
    config::Settings,
    domain::error::RouteError,
};

use super::{
    PipelineServices,
    stage::{Pipeline, StageContext, StageResult},
};

/// A compiled page with its producer and stage chain.
pub struct Route {
    producer: Producer,
    pipeline: Pipeline,
    /// Paths a strict static page may serve. `None` when any match is accepted.
    allowed_paths: Option<HashSet<String>>,
}

impl Route {
    pub fn page(&self) -> &Arc<Page> {
        self.producer.page()
    }

    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn admits(&self, path: &str) -> bool {
        self.allowed_paths
            .as_ref()
            .is_none_or(|allowed| allowed.contains(path))
    }
}

/// Ordered route candidates. The first route whose pipeline answers wins.
pub struct RouteTable {
    routes: Vec<Route>,
    services: Arc<PipelineServices>,
    context: Arc<ProductionContext>,
}

impl RouteTable {
    pub fn new(services: Arc<PipelineServices>, context: Arc<ProductionContext>) -> Self {
        Self {
            routes: Vec::new(),
            services,
            context,
        }
    }

    /// Empty table with services and hash context taken from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(PipelineServices::from_settings(settings)),
            Arc::new(ProductionContext::from_settings(settings)),
        )
    }

    /// Load the configured cache snapshot. `Ok(0)` without a cache or snapshot path.
    pub async fn restore_snapshot(&self) -> Result<usize, PipelineError> {
        match (self.services.cache(), self.services.snapshot_path()) {
            (Some(cache), Some(path)) => Ok(cache.load(path).await?),
            _ => Ok(0),
        }
    }

    /// Write the cache to the configured snapshot path, if any.
    pub async fn persist_snapshot(&self) -> Result<usize, PipelineError> {
        match (self.services.cache(), self.services.snapshot_path()) {
            (Some(cache), Some(path)) => Ok(cache.persist(path).await?),
            _ => Ok(0),
        }
    }

    /// Append a page. Strict static pages enumerate their build paths here, once.
    pub async fn register(&mut self, page: Page) -> Result<(), ProducerError> {
        let page = Arc::new(page);
        let producer = Producer::new(Arc::clone(&page), Arc::clone(&self.context));

        let allowed_paths = match page.as_static() {
            Some(static_page) if static_page.strict_paths() => {
                let params = producer.get_path_params().await?;
                let paths = params
                    .iter()
                    .map(|params| page.compile_path(params))
                    .collect::<Result<HashSet<_>, RouteError>>()?;
                Some(paths)
            }
            _ => None,
        };

        info!(
            route = page.route(),
            module = page.module_id(),
            kind = ?page.kind(),
            strict_paths = allowed_paths.as_ref().map(HashSet::len),
            "registered route"
        );

        self.routes.push(Route {
            pipeline: Pipeline::for_page(&page),
            producer,
            allowed_paths,
        });
        Ok(())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn services(&self) -> &Arc<PipelineServices> {
        &self.services
    }

    pub fn context(&self) -> &Arc<ProductionContext> {
        &self.context
    }

    /// Run the request through each matching route in turn. `Ok(None)` when no
    /// route matched, every match failed its strict-path check, or every pipeline yielded.
    #[instrument(skip_all, fields(method = %request.method(), path = %request.path()))]
    pub async fn handle(
        &self,
        request: &PageRequest,
        state: &RequestState,
        session: Option<&SessionData>,
    ) -> StageResult {
        for route in &self.routes {
            let Some(params) = route.page().match_path(request.path()) else {
                continue;
            };
            let path = route
                .page()
                .compile_path(&params)
                .map_err(|err| PipelineError::Producer(err.into()))?;

            if !route.admits(&path) {
                debug!(
                    route = route.page().route(),
                    path = %path,
                    outcome = "rejected",
                    "path not among strict build paths"
                );
                continue;
            }

            let ctx = StageContext {
                request,
                producer: &route.producer,
                services: &self.services,
                path: &path,
                params: &params,
                state,
                session,
            };
            if let Some(response) = route.pipeline.run(&ctx).await? {
                return Ok(Some(response.conditional(request)));
            }
            debug!(
                route = route.page().route(),
                outcome = "yield",
                "route yielded, trying next candidate"
            );
        }
        Ok(None)
    }
}
