use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, Level, debug, error, info_span, warn};
use uuid::Uuid;

use crate::{application::error::ErrorReport, cache::GENERATION_DATE_HEADER};

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    /// Keep a caller-supplied id when it is short and printable, mint one otherwise.
    fn from_request(request: &Request<Body>) -> Self {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self { request_id }
    }
}

/// Tag the request with an id, echo it on the response, and run the rest of the
/// stack inside a `request` span.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_request(&request);
    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

fn level_for(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        Level::DEBUG
    }
}

/// One line per page response. Failures carry the attached [`ErrorReport`].
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let query = request.uri().query().unwrap_or("").to_string();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, chain) = report
        .map(|report| (report.source, report.messages))
        .unwrap_or(("pipeline", Vec::new()));
    let generated = response
        .headers()
        .get(GENERATION_DATE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let level = level_for(status);
    if level == Level::ERROR {
        error!(
            target: "frugal::http::response",
            status = status.as_u16(),
            query,
            elapsed_ms,
            source,
            chain = ?chain,
            "page request failed"
        );
    } else if level == Level::WARN {
        warn!(
            target: "frugal::http::response",
            status = status.as_u16(),
            query,
            elapsed_ms,
            source,
            chain = ?chain,
            "page request rejected"
        );
    } else {
        debug!(
            target: "frugal::http::response",
            status = status.as_u16(),
            elapsed_ms,
            generated,
            "page served"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_request_id_is_kept_when_reasonable() {
        let request = Request::builder()
            .header("x-request-id", " abc-123 ")
            .body(Body::empty())
            .expect("request");
        assert_eq!(RequestContext::from_request(&request).request_id, "abc-123");

        let oversized = Request::builder()
            .header("x-request-id", "x".repeat(MAX_REQUEST_ID_LEN + 1))
            .body(Body::empty())
            .expect("request");
        let minted = RequestContext::from_request(&oversized).request_id;
        assert!(Uuid::parse_str(&minted).is_ok());
    }

    #[test]
    fn status_picks_log_level() {
        assert_eq!(level_for(StatusCode::OK), Level::DEBUG);
        assert_eq!(level_for(StatusCode::NOT_MODIFIED), Level::DEBUG);
        assert_eq!(level_for(StatusCode::NOT_FOUND), Level::WARN);
        assert_eq!(level_for(StatusCode::INTERNAL_SERVER_ERROR), Level::ERROR);
    }
}
