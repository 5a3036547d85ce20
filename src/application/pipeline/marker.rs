//! Signed markers that steer a request past the cache.

use axum::http::Uri;

use crate::application::{
    page::PageRequest,
    token::{TokenCodec, TokenPurpose},
};

pub const FORCE_GENERATE_COOKIE: &str = "__frugal_force_generate";
pub const FORCE_GENERATE_HEADER: &str = "x-frugal-force-generate";
pub const FORCE_REFRESH_PARAM: &str = "force_refresh";
pub const FORCE_REFRESH_HEADER: &str = "x-frugal-force-refresh";

/// Where a valid marker was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerSource {
    Cookie,
    Header,
    Query,
}

pub fn force_generate_marker(
    request: &PageRequest,
    codec: Option<&TokenCodec>,
) -> Option<MarkerSource> {
    let codec = codec?;
    let valid = |token: &str| codec.check(token, TokenPurpose::ForceGenerate);

    if request.cookie(FORCE_GENERATE_COOKIE).is_some_and(valid) {
        return Some(MarkerSource::Cookie);
    }
    if request.header(FORCE_GENERATE_HEADER).is_some_and(valid) {
        return Some(MarkerSource::Header);
    }
    None
}

pub fn refresh_marker(request: &PageRequest, codec: Option<&TokenCodec>) -> Option<MarkerSource> {
    let codec = codec?;
    let valid = |token: &str| codec.check(token, TokenPurpose::Refresh);

    if request
        .query_param(FORCE_REFRESH_PARAM)
        .is_some_and(|token| valid(&token))
    {
        return Some(MarkerSource::Query);
    }
    if request.header(FORCE_REFRESH_HEADER).is_some_and(valid) {
        return Some(MarkerSource::Header);
    }
    None
}

pub fn force_generate_cookie(token: &str) -> String {
    format!("{FORCE_GENERATE_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/")
}

pub fn clear_force_generate_cookie() -> String {
    format!("{FORCE_GENERATE_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Same path and query, minus the refresh parameter.
pub fn without_refresh_param(uri: &Uri) -> String {
    let remaining: Vec<(String, String)> = uri
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key != FORCE_REFRESH_PARAM)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    if remaining.is_empty() {
        return uri.path().to_string();
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(remaining)
        .finish();
    format!("{}?{query}", uri.path())
}
