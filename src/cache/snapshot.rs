//! On-disk form of the response cache.
//!
//! Generation date and max age travel as headers so a snapshot entry reads like
//! the response it will be served as.

use std::path::Path;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::util::http_date;

use super::{
    entry::{CachedResponse, GENERATION_DATE_HEADER, MAX_AGE_HEADER},
    error::CacheError,
};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedResponse {
    pub path: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Header values that are not valid UTF-8, base64-encoded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opaque_headers: Vec<(String, String)>,
    pub status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Least recently used first.
    pub entries: Vec<SerializedResponse>,
}

impl Snapshot {
    pub fn new(entries: Vec<SerializedResponse>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            entries,
        }
    }

    pub async fn read(path: &Path) -> Result<Self, CacheError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| CacheError::io(path, source))?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::Version(snapshot.version));
        }
        Ok(snapshot)
    }

    pub async fn write(&self, path: &Path) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(self)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CacheError::io(parent, source))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| CacheError::io(path, source))
    }
}

impl From<&CachedResponse> for SerializedResponse {
    fn from(response: &CachedResponse) -> Self {
        let mut headers = Vec::new();
        let mut opaque_headers = Vec::new();
        for (name, value) in response.headers() {
            let name = name.as_str().to_string();
            match value.to_str() {
                Ok(text) => headers.push((name, text.to_string())),
                Err(_) => opaque_headers.push((name, STANDARD.encode(value.as_bytes()))),
            }
        }
        headers.push((
            GENERATION_DATE_HEADER.to_string(),
            http_date::format(response.generated_at()),
        ));
        headers.push((MAX_AGE_HEADER.to_string(), response.max_age().to_string()));

        Self {
            path: response.path().to_string(),
            hash: response.hash().to_string(),
            body: response.body().map(str::to_string),
            headers,
            opaque_headers,
            status: response.status().as_u16(),
        }
    }
}

impl TryFrom<SerializedResponse> for CachedResponse {
    type Error = CacheError;

    fn try_from(serialized: SerializedResponse) -> Result<Self, Self::Error> {
        let path = serialized.path;
        let status = StatusCode::from_u16(serialized.status)
            .map_err(|_| CacheError::invalid_entry(&path, "status code out of range"))?;

        let mut headers = HeaderMap::new();
        let mut generated_at = None;
        let mut max_age = None;
        for (name, value) in serialized.headers {
            if name.eq_ignore_ascii_case(GENERATION_DATE_HEADER) {
                generated_at = http_date::parse(&value);
            } else if name.eq_ignore_ascii_case(MAX_AGE_HEADER) {
                max_age = value.trim().parse::<i64>().ok();
            } else {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| CacheError::invalid_entry(&path, format!("bad header `{name}`")))?;
                let value = HeaderValue::from_str(&value).map_err(|_| {
                    CacheError::invalid_entry(&path, format!("bad value for header `{name}`"))
                })?;
                headers.append(name, value);
            }
        }
        for (name, encoded) in serialized.opaque_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| CacheError::invalid_entry(&path, format!("bad header `{name}`")))?;
            let value = STANDARD
                .decode(encoded.as_bytes())
                .ok()
                .and_then(|bytes| HeaderValue::from_bytes(&bytes).ok())
                .ok_or_else(|| {
                    CacheError::invalid_entry(&path, format!("bad value for header `{name}`"))
                })?;
            headers.append(name, value);
        }

        let generated_at = generated_at
            .ok_or_else(|| CacheError::invalid_entry(&path, "missing generation date"))?;
        let max_age =
            max_age.ok_or_else(|| CacheError::invalid_entry(&path, "missing max age"))?;

        Ok(CachedResponse::from_parts(
            path,
            serialized.hash,
            serialized.body,
            headers,
            status,
            generated_at,
            max_age,
        ))
    }
}
