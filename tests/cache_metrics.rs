use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, Uri};
use frugal::{
    application::{
        error::BoxError,
        generated::ProductionContext,
        page::{BuildContext, Page, PageDescriptor, PageRequest, RenderContext, RequestState},
        pipeline::{PipelineServices, RouteTable},
    },
    cache::{CacheConfig, ResponseCache},
    domain::{data::DataValue, response::ResponseValue},
};
use metrics_util::debugging::DebuggingRecorder;

/// Responses go stale immediately.
struct Ticker;

#[async_trait]
impl PageDescriptor for Ticker {
    fn route(&self) -> &str {
        "/tick/:n"
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, BoxError> {
        Ok(format!("tick {}", ctx.params.get("n").unwrap_or("?")))
    }

    async fn build(&self, _ctx: BuildContext<'_>) -> Result<Option<ResponseValue>, BoxError> {
        Ok(Some(
            ResponseValue::data(DataValue::empty_record()).max_age(0),
        ))
    }
}

#[tokio::test]
async fn cache_and_pipeline_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cache = Arc::new(ResponseCache::new(&CacheConfig {
        response_limit: 1,
        ..Default::default()
    }));
    let mut routes = RouteTable::new(
        Arc::new(PipelineServices::default().with_cache(Arc::clone(&cache))),
        Arc::new(ProductionContext::new("metrics-test")),
    );
    routes
        .register(Page::compile(Arc::new(Ticker), "pages/tick").expect("compiles"))
        .await
        .expect("registers");

    // miss + build, stale, then a second path evicts the first
    for (uri, pause) in [("/tick/1", true), ("/tick/1", false), ("/tick/2", false)] {
        let request = PageRequest::new(Method::GET, uri.parse::<Uri>().expect("uri"));
        routes
            .handle(&request, &RequestState::new(), None)
            .await
            .expect("pipeline succeeds")
            .expect("response");
        if pause {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    assert!(cache.has("/tick/2"));
    assert!(cache.get("/tick/2").is_some());

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "frugal_cache_hit_total",
        "frugal_cache_miss_total",
        "frugal_cache_evict_total",
        "frugal_cache_stale_total",
        "frugal_pipeline_stage_total",
        "frugal_produce_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
