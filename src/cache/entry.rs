use axum::http::{HeaderMap, StatusCode};
use time::OffsetDateTime;

use crate::application::{error::PageError, generated::GeneratedResponse};

pub const GENERATION_DATE_HEADER: &str = "x-frugal-generation-date";
pub const MAX_AGE_HEADER: &str = "x-frugal-max-age";

/// A materialized response with its body rendered, as held by the response cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    path: String,
    hash: String,
    body: Option<String>,
    headers: HeaderMap,
    status: StatusCode,
    generated_at: OffsetDateTime,
    max_age: i64,
}

impl CachedResponse {
    /// Render the body of a freshly produced response.
    pub fn from_generated(response: &GeneratedResponse) -> Result<Self, PageError> {
        Ok(Self {
            path: response.path().to_string(),
            hash: response.hash().to_string(),
            body: response.body()?.map(str::to_string),
            headers: response.headers().clone(),
            status: response.status(),
            generated_at: response.generated_at(),
            max_age: response.max_age(),
        })
    }

    pub(crate) fn from_parts(
        path: String,
        hash: String,
        body: Option<String>,
        headers: HeaderMap,
        status: StatusCode,
        generated_at: OffsetDateTime,
        max_age: i64,
    ) -> Self {
        Self {
            path,
            hash,
            body,
            headers,
            status,
            generated_at,
            max_age,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Author-supplied headers. Standard headers are added on the wire.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn generated_at(&self) -> OffsetDateTime {
        self.generated_at
    }

    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    /// A negative max age never goes stale; otherwise stale strictly after `max_age` seconds.
    pub fn is_stale_at(&self, now: OffsetDateTime) -> bool {
        if self.max_age < 0 {
            return false;
        }
        let age_ms = (now - self.generated_at).whole_milliseconds();
        age_ms > i128::from(self.max_age) * 1000
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(OffsetDateTime::now_utc())
    }

    pub(crate) fn with_generated_at(mut self, generated_at: OffsetDateTime) -> Self {
        self.generated_at = generated_at;
        self
    }
}
