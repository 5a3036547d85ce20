//! Author-facing output of `build` and `generate`.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use super::data::DataValue;

/// Freshness budget for data responses that do not declare one: never stale.
pub const NEVER_STALE: i64 = -1;

#[derive(Debug, Clone)]
pub enum ResponseKind {
    Data(DataValue),
    Empty,
}

/// A data payload (or nothing) plus the HTTP metadata the page wants on its response.
///
/// Values are built once by page code and never mutated afterwards; the builder
/// methods consume `self`.
#[derive(Debug, Clone)]
pub struct ResponseValue {
    kind: ResponseKind,
    headers: HeaderMap,
    status: Option<StatusCode>,
    max_age: i64,
    force_dynamic: bool,
}

impl ResponseValue {
    /// A data response rendered through the page's `render`.
    pub fn data(payload: impl Into<DataValue>) -> Self {
        Self {
            kind: ResponseKind::Data(payload.into()),
            headers: HeaderMap::new(),
            status: None,
            max_age: NEVER_STALE,
            force_dynamic: false,
        }
    }

    /// A response without body, e.g. a redirect or a bare status.
    pub fn empty() -> Self {
        Self {
            kind: ResponseKind::Empty,
            headers: HeaderMap::new(),
            status: None,
            max_age: 0,
            force_dynamic: false,
        }
    }

    /// Seconds the materialized response stays fresh; negative means never stale.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Ask the runtime to serve the next read of this path through a live `generate`.
    pub fn force_dynamic(mut self) -> Self {
        self.force_dynamic = true;
        self
    }

    pub fn kind(&self) -> &ResponseKind {
        &self.kind
    }

    pub fn payload(&self) -> Option<&DataValue> {
        match &self.kind {
            ResponseKind::Data(payload) => Some(payload),
            ResponseKind::Empty => None,
        }
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn freshness_seconds(&self) -> i64 {
        self.max_age
    }

    pub fn is_force_dynamic(&self) -> bool {
        self.force_dynamic
    }

    pub(crate) fn into_parts(self) -> (ResponseKind, HeaderMap, StatusCode, i64, bool) {
        let status = self.status_code();
        (
            self.kind,
            self.headers,
            status,
            self.max_age,
            self.force_dynamic,
        )
    }
}
