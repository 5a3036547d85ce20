use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    cache::CacheError,
    domain::{error::RouteError, route::PathParams},
};

/// Boxed error type page code returns from `render`, `build` and `generate`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Cause chain of a failure, attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Which page operation an author error escaped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOperation {
    Render,
    Build,
    Generate,
    BuildPaths,
}

impl PageOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            PageOperation::Render => "render",
            PageOperation::Build => "build",
            PageOperation::Generate => "generate",
            PageOperation::BuildPaths => "getBuildPaths",
        }
    }
}

/// An exception raised by page code, wrapped with the route and params it ran for.
#[derive(Debug, Error)]
#[error("error during {} of page `{route}` with params {params}", .operation.as_str())]
pub struct PageError {
    pub route: String,
    pub params: PathParams,
    pub operation: PageOperation,
    #[source]
    pub source: BoxError,
}

impl PageError {
    /// Wrap `error` unless it already is a page error.
    pub fn wrap(
        route: &str,
        params: &PathParams,
        operation: PageOperation,
        error: BoxError,
    ) -> Self {
        match error.downcast::<PageError>() {
            Ok(existing) => *existing,
            Err(source) => Self {
                route: route.to_string(),
                params: params.clone(),
                operation,
                source,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("can't build dynamic page `{route}`")]
    DynamicBuild { route: String },
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Path(#[from] RouteError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Producer(#[from] ProducerError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::Producer(_) | PipelineError::Cache(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let report = ErrorReport::from_error("application::pipeline", status, &self);
        let mut response = (status, "Internal server error").into_response();
        report.attach(&mut response);
        response
    }
}
