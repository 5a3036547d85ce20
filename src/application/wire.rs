//! Transport-neutral HTTP response emitted by the pipeline.

use axum::http::{
    HeaderMap, HeaderName, HeaderValue, StatusCode,
    header::{
        CACHE_CONTROL, CONTENT_LOCATION, CONTENT_TYPE, ETAG, EXPIRES, IF_NONE_MATCH,
        LAST_MODIFIED, LOCATION, SET_COOKIE, VARY,
    },
};
use tracing::warn;

use crate::{
    cache::{CachedResponse, GENERATION_DATE_HEADER},
    util::{hash::weak_etag, http_date},
};

use super::page::PageRequest;

pub const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl WireResponse {
    pub fn redirect(location: &str) -> Self {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(location) {
            Ok(value) => {
                headers.insert(LOCATION, value);
            }
            Err(_) => warn!(location, "redirect target is not a valid header value"),
        }
        Self {
            status: StatusCode::SEE_OTHER,
            headers,
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn append_cookie(&mut self, cookie: &str) {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                self.headers.append(SET_COOKIE, value);
            }
            Err(_) => warn!("dropping cookie that is not a valid header value"),
        }
    }

    /// `304 Not Modified` when the request's `If-None-Match` names this response's
    /// `ETag`. Keeps the validators, the caching metadata a 200 would have sent,
    /// and every `Set-Cookie`.
    pub fn conditional(self, request: &PageRequest) -> Self {
        if !request.is_read_only() || !self.status.is_success() {
            return self;
        }
        let Some(etag) = self.headers.get(ETAG) else {
            return self;
        };
        let matches = request
            .headers()
            .get_all(IF_NONE_MATCH)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .any(|candidate| candidate == "*" || candidate.as_bytes() == etag.as_bytes());
        if !matches {
            return self;
        }

        let mut headers = HeaderMap::new();
        for name in [
            ETAG,
            LAST_MODIFIED,
            CACHE_CONTROL,
            CONTENT_LOCATION,
            EXPIRES,
            VARY,
            SET_COOKIE,
            HeaderName::from_static(GENERATION_DATE_HEADER),
        ] {
            for value in self.headers.get_all(&name) {
                headers.append(name.clone(), value.clone());
            }
        }
        Self {
            status: StatusCode::NOT_MODIFIED,
            headers,
            body: None,
        }
    }
}

impl From<&CachedResponse> for WireResponse {
    /// Author headers plus the standard ones: generation date, `Last-Modified`,
    /// a weak `ETag` over the body, and a default `Content-Type`.
    fn from(response: &CachedResponse) -> Self {
        let mut headers = response.headers().clone();
        let generated = http_date::format(response.generated_at());

        if let Ok(value) = HeaderValue::from_str(&generated) {
            headers.insert(HeaderName::from_static(GENERATION_DATE_HEADER), value.clone());
            if !headers.contains_key(LAST_MODIFIED) {
                headers.insert(LAST_MODIFIED, value);
            }
        }

        if let Some(body) = response.body() {
            if !headers.contains_key(ETAG)
                && let Ok(value) = HeaderValue::from_str(&weak_etag(body))
            {
                headers.insert(ETAG, value);
            }
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
            }
        }

        Self {
            status: response.status(),
            headers,
            body: response.body().map(str::to_string),
        }
    }
}
