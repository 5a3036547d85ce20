//! The regeneration stages, in the order a static route runs them.

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

use crate::{
    application::{
        error::ProducerError, generated::GeneratedResponse, token::TokenPurpose,
        wire::WireResponse,
    },
    cache::CachedResponse,
};

use super::{
    RuntimeMode,
    marker::{
        MarkerSource, clear_force_generate_cookie, force_generate_cookie, force_generate_marker,
        refresh_marker, without_refresh_param,
    },
    stage::{Next, Stage, StageContext, StageResult},
};

const METRIC_STAGE: &str = "frugal_pipeline_stage_total";
const METRIC_STALE: &str = "frugal_cache_stale_total";

fn answered(stage: &'static str, outcome: &'static str) {
    debug!(stage, outcome, "stage answered");
    counter!(METRIC_STAGE, "stage" => stage).increment(1);
}

fn yielded(stage: &'static str, reason: &'static str) {
    debug!(stage, outcome = "yield", reason, "stage yielded");
}

/// Render a produced response, optionally store it, and convert it for the wire.
/// A force-dynamic response re-arms the force-generate cookie; otherwise a consumed
/// cookie marker is cleared.
fn respond(
    stage: &'static str,
    outcome: &'static str,
    ctx: &StageContext<'_>,
    generated: &GeneratedResponse,
    store: bool,
    clear_marker: bool,
) -> StageResult {
    let rendered = render(generated)?;
    let rendered = match ctx.services.cache() {
        Some(cache) if store => cache.add(rendered),
        _ => rendered,
    };

    let mut wire = WireResponse::from(&rendered);
    if generated.is_force_dynamic() {
        if let Some(codec) = ctx.services.codec() {
            match codec.mint(TokenPurpose::ForceGenerate) {
                Ok(token) => wire.append_cookie(&force_generate_cookie(&token)),
                Err(err) => warn!(stage, error = %err, "failed to mint force-generate token"),
            }
        }
    } else if clear_marker {
        wire.append_cookie(&clear_force_generate_cookie());
    }

    answered(stage, outcome);
    Ok(Some(wire))
}

fn render(generated: &GeneratedResponse) -> Result<CachedResponse, ProducerError> {
    Ok(CachedResponse::from_generated(generated)?)
}

/// Live `generate` when a valid force-generate marker is present on a read-only
/// request, and always for other methods.
pub struct ForceGenerate;

#[async_trait]
impl Stage for ForceGenerate {
    fn name(&self) -> &'static str {
        "force_generate"
    }

    async fn handle(&self, ctx: &StageContext<'_>, next: Next<'_>) -> StageResult {
        let read_only = ctx.request.is_read_only();
        let marker = force_generate_marker(ctx.request, ctx.services.codec());
        if read_only && marker.is_none() {
            yielded(self.name(), "no marker");
            return next.run(ctx).await;
        }

        let generated = ctx
            .producer
            .generate_live(
                ctx.request,
                ctx.path,
                ctx.params.clone(),
                ctx.state,
                ctx.session,
            )
            .await?;
        let Some(generated) = generated else {
            yielded(self.name(), "no response");
            return next.run(ctx).await;
        };

        let clear_marker = read_only && marker == Some(MarkerSource::Cookie);
        respond(self.name(), "generated", ctx, &generated, false, clear_marker)
    }
}

/// Synchronous rebuild on a valid refresh marker, stored in the cache and
/// answered with a `303` to the same URL minus the refresh parameter. Never
/// renders inline, whichever variant carried the marker.
pub struct Refresh;

#[async_trait]
impl Stage for Refresh {
    fn name(&self) -> &'static str {
        "refresh"
    }

    async fn handle(&self, ctx: &StageContext<'_>, next: Next<'_>) -> StageResult {
        let Some(source) = refresh_marker(ctx.request, ctx.services.codec()) else {
            yielded(self.name(), "no marker");
            return next.run(ctx).await;
        };

        let Some(generated) = ctx.producer.build(ctx.params.clone()).await? else {
            yielded(self.name(), "no response");
            return next.run(ctx).await;
        };

        let rendered = render(&generated)?;
        if let Some(cache) = ctx.services.cache() {
            cache.add(rendered);
        }
        debug!(stage = self.name(), marker = ?source, "refreshed cache entry");
        answered(self.name(), "redirect");
        Ok(Some(WireResponse::redirect(&without_refresh_param(
            ctx.request.uri(),
        ))))
    }
}

/// In watch mode, regenerate on every request and keep the cache in step.
pub struct WatchRebuild;

#[async_trait]
impl Stage for WatchRebuild {
    fn name(&self) -> &'static str {
        "watch_rebuild"
    }

    async fn handle(&self, ctx: &StageContext<'_>, next: Next<'_>) -> StageResult {
        if ctx.services.mode() != RuntimeMode::Watch {
            return next.run(ctx).await;
        }

        let generated = ctx
            .producer
            .generate(
                ctx.request,
                ctx.path,
                ctx.params.clone(),
                ctx.state,
                ctx.session,
            )
            .await?;
        let Some(generated) = generated else {
            yielded(self.name(), "no response");
            return next.run(ctx).await;
        };

        respond(self.name(), "generated", ctx, &generated, true, false)
    }
}

/// Answer read-only requests from a fresh cache entry.
pub struct ServeFromCache;

#[async_trait]
impl Stage for ServeFromCache {
    fn name(&self) -> &'static str {
        "serve_from_cache"
    }

    async fn handle(&self, ctx: &StageContext<'_>, next: Next<'_>) -> StageResult {
        let Some(cache) = ctx.services.cache() else {
            return next.run(ctx).await;
        };
        if !ctx.request.is_read_only() {
            return next.run(ctx).await;
        }

        match cache.get(ctx.path) {
            None => {
                yielded(self.name(), "miss");
                next.run(ctx).await
            }
            Some(entry) if entry.is_stale() => {
                counter!(METRIC_STALE).increment(1);
                debug!(
                    stage = self.name(),
                    outcome = "stale",
                    max_age = entry.max_age(),
                    "cached response is stale"
                );
                next.run(ctx).await
            }
            Some(entry) => {
                answered(self.name(), "hit");
                Ok(Some(WireResponse::from(&entry)))
            }
        }
    }
}

/// Terminal fallback for read-only requests: build now, store when a cache exists.
pub struct JustInTimeBuild;

#[async_trait]
impl Stage for JustInTimeBuild {
    fn name(&self) -> &'static str {
        "just_in_time_build"
    }

    async fn handle(&self, ctx: &StageContext<'_>, next: Next<'_>) -> StageResult {
        if !ctx.request.is_read_only() {
            return next.run(ctx).await;
        }

        let Some(generated) = ctx.producer.build(ctx.params.clone()).await? else {
            yielded(self.name(), "no response");
            return next.run(ctx).await;
        };

        respond(self.name(), "built", ctx, &generated, true, false)
    }
}

/// The only stage of a dynamic route.
pub struct Generate;

#[async_trait]
impl Stage for Generate {
    fn name(&self) -> &'static str {
        "generate"
    }

    async fn handle(&self, ctx: &StageContext<'_>, next: Next<'_>) -> StageResult {
        let generated = ctx
            .producer
            .generate(
                ctx.request,
                ctx.path,
                ctx.params.clone(),
                ctx.state,
                ctx.session,
            )
            .await?;
        let Some(generated) = generated else {
            yielded(self.name(), "no response");
            return next.run(ctx).await;
        };

        respond(self.name(), "generated", ctx, &generated, false, false)
    }
}
