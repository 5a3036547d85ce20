use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{Instrument, debug_span};

use crate::{
    application::{
        error::PipelineError,
        page::{Page, PageRequest, RequestState, SessionData},
        producer::Producer,
        wire::WireResponse,
    },
    domain::route::PathParams,
};

use super::{
    PipelineServices,
    stages::{ForceGenerate, Generate, JustInTimeBuild, Refresh, ServeFromCache, WatchRebuild},
};

/// `Ok(None)` means every stage yielded.
pub type StageResult = Result<Option<WireResponse>, PipelineError>;

/// Everything a stage may look at for one matched request.
pub struct StageContext<'a> {
    pub request: &'a PageRequest,
    pub producer: &'a Producer,
    pub services: &'a PipelineServices,
    /// Canonical path, compiled from `params`. Used as the cache key.
    pub path: &'a str,
    pub params: &'a PathParams,
    pub state: &'a RequestState,
    pub session: Option<&'a SessionData>,
}

/// One decision step. A stage either answers or hands the request to `next`.
///
/// `next` is consumed by `run`, so a stage defers at most once; returning
/// without calling it short-circuits the remaining stages.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &StageContext<'_>, next: Next<'_>) -> StageResult;
}

/// The stages after the current one.
pub struct Next<'a> {
    stages: &'a [Box<dyn Stage>],
}

impl<'a> Next<'a> {
    pub fn run<'c>(self, ctx: &'c StageContext<'c>) -> BoxFuture<'c, StageResult>
    where
        'a: 'c,
    {
        Box::pin(async move {
            let Some((stage, rest)) = self.stages.split_first() else {
                return Ok(None);
            };
            let span = debug_span!("stage", stage = stage.name(), path = ctx.path);
            stage
                .handle(ctx, Next { stages: rest })
                .instrument(span)
                .await
        })
    }
}

/// Stages in fixed order, composed through [`Next`].
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Static routes run the full regeneration chain; dynamic routes only generate.
    pub fn for_page(page: &Page) -> Self {
        match page {
            Page::Static(_) => Self::new(vec![
                Box::new(ForceGenerate),
                Box::new(Refresh),
                Box::new(WatchRebuild),
                Box::new(ServeFromCache),
                Box::new(JustInTimeBuild),
            ]),
            Page::Dynamic(_) => Self::new(vec![Box::new(Generate)]),
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub async fn run(&self, ctx: &StageContext<'_>) -> StageResult {
        Next {
            stages: &self.stages,
        }
        .run(ctx)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::http::StatusCode;

    use super::*;
    use crate::application::{
        error::BoxError,
        generated::ProductionContext,
        page::{PageDescriptor, RenderContext},
    };

    struct Blank;

    #[async_trait]
    impl PageDescriptor for Blank {
        fn route(&self) -> &str {
            "/"
        }

        fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, BoxError> {
            Ok(String::new())
        }
    }

    struct Recording {
        name: &'static str,
        answer: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Stage for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, ctx: &StageContext<'_>, next: Next<'_>) -> StageResult {
            self.log.lock().expect("log lock").push(self.name);
            if self.answer {
                return Ok(Some(WireResponse {
                    status: StatusCode::OK,
                    headers: Default::default(),
                    body: Some(self.name.to_string()),
                }));
            }
            next.run(ctx).await
        }
    }

    async fn run(pipeline: &Pipeline) -> StageResult {
        let page = Arc::new(Page::compile(Arc::new(Blank), "m").expect("compiles"));
        let producer = Producer::new(page, Arc::new(ProductionContext::new("c")));
        let services = PipelineServices::default();
        let request = PageRequest::get("/");
        let params = PathParams::new();
        let state = RequestState::new();
        let ctx = StageContext {
            request: &request,
            producer: &producer,
            services: &services,
            path: "/",
            params: &params,
            state: &state,
            session: None,
        };
        pipeline.run(&ctx).await
    }

    fn recording(
        name: &'static str,
        answer: bool,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Box<dyn Stage> {
        Box::new(Recording {
            name,
            answer,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn stages_run_in_order_until_one_answers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![
            recording("first", false, &log),
            recording("second", true, &log),
            recording("third", true, &log),
        ]);

        let answer = run(&pipeline).await.expect("runs").expect("answered");
        assert_eq!(answer.body.as_deref(), Some("second"));
        assert_eq!(*log.lock().expect("log lock"), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn all_yielding_stages_produce_no_response() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(vec![recording("a", false, &log), recording("b", false, &log)]);

        assert!(run(&pipeline).await.expect("runs").is_none());
        assert_eq!(log.lock().expect("log lock").len(), 2);
    }

    #[test]
    fn static_and_dynamic_chains_differ() {
        let page = Page::compile(Arc::new(Blank), "m").expect("compiles");
        assert_eq!(
            Pipeline::for_page(&page).stage_names(),
            vec![
                "force_generate",
                "refresh",
                "watch_rebuild",
                "serve_from_cache",
                "just_in_time_build"
            ]
        );
    }
}
