//! Axum adapter: every request not claimed by another router is run through the
//! route table.

mod middleware;

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    application::{
        error::ErrorReport,
        page::{PageRequest, RequestState, SessionData},
        pipeline::RouteTable,
        wire::WireResponse,
    },
    infra::error::InfraError,
};

pub use middleware::RequestContext;

#[derive(Clone)]
pub struct FrugalState {
    pub routes: Arc<RouteTable>,
}

impl FrugalState {
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes: Arc::new(routes),
        }
    }
}

pub fn build_router(state: FrugalState) -> Router {
    Router::new()
        .fallback(serve_page)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

/// Serve `routes` on `listener` until `shutdown` resolves. The configured cache
/// snapshot is loaded before the first request and written back after the last.
pub async fn serve<F>(
    listener: TcpListener,
    routes: RouteTable,
    shutdown: F,
) -> Result<(), InfraError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let restored = routes.restore_snapshot().await?;
    let state = FrugalState::new(routes);
    let routes = Arc::clone(&state.routes);
    info!(
        addr = ?listener.local_addr().ok(),
        restored,
        routes = routes.routes().len(),
        "serving pages"
    );

    axum::serve(listener, build_router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    let persisted = routes.persist_snapshot().await?;
    info!(persisted, "server stopped");
    Ok(())
}

/// Host middleware may attach [`RequestState`] and [`SessionData`] as request extensions.
async fn serve_page(State(state): State<FrugalState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let mut response = (StatusCode::BAD_REQUEST, "Unreadable request body").into_response();
            ErrorReport::from_error("infra::http::serve_page", StatusCode::BAD_REQUEST, &err)
                .attach(&mut response);
            return response;
        }
    };

    let request_state = parts
        .extensions
        .get::<RequestState>()
        .cloned()
        .unwrap_or_default();
    let session = parts.extensions.get::<SessionData>().cloned();
    let page_request = PageRequest::new(parts.method, parts.uri)
        .with_headers(parts.headers)
        .with_body(body);

    match state
        .routes
        .handle(&page_request, &request_state, session.as_ref())
        .await
    {
        Ok(Some(wire)) => wire.into_response(),
        Ok(None) => not_found(&page_request),
        Err(err) => err.into_response(),
    }
}

fn not_found(request: &PageRequest) -> Response {
    let mut response = (StatusCode::NOT_FOUND, "Not found").into_response();
    ErrorReport::from_message(
        "infra::http::serve_page",
        StatusCode::NOT_FOUND,
        format!("no route produced a response for `{}`", request.path()),
    )
    .attach(&mut response);
    response
}

impl IntoResponse for WireResponse {
    fn into_response(self) -> Response {
        let body = self.body.map(Body::from).unwrap_or_else(Body::empty);
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
