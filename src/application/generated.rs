//! Materialized responses: a response value bound to a path, hashed and lazily rendered.

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use once_cell::sync::OnceCell;
use time::OffsetDateTime;

use crate::{
    config::Settings,
    domain::{
        data::DataValue,
        response::{ResponseKind, ResponseValue},
        route::PathParams,
    },
    util::hash::{ContentHasher, content_hash, hash_data},
};

use super::{error::PageError, page::Page};

type RenderThunk = Box<dyn Fn() -> Result<String, PageError> + Send + Sync>;

/// Inputs that take part in every content hash besides the data itself.
#[derive(Debug, Clone)]
pub struct ProductionContext {
    build_config_id: String,
}

impl ProductionContext {
    pub fn new(build_config_id: impl Into<String>) -> Self {
        Self {
            build_config_id: build_config_id.into(),
        }
    }

    /// Hashes carry the configured `runtime.build_config_id`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.runtime.build_config_id.clone())
    }

    pub fn build_config_id(&self) -> &str {
        &self.build_config_id
    }

    /// Bind a response value to a path. The body is rendered on first access only.
    pub fn materialize(
        &self,
        page: Arc<Page>,
        path: String,
        params: PathParams,
        value: ResponseValue,
    ) -> GeneratedResponse {
        let (kind, headers, status, max_age, force_dynamic) = value.into_parts();

        let data_hash = match &kind {
            ResponseKind::Data(payload) => hash_data(payload),
            ResponseKind::Empty => empty_hash(status, &headers),
        };
        let hash = content_hash(&data_hash, &path, page.module_id(), &self.build_config_id);

        let render: Option<RenderThunk> = match kind {
            ResponseKind::Data(payload) => {
                let path = path.clone();
                Some(Box::new(move || render_payload(&page, &path, &params, &payload)))
            }
            ResponseKind::Empty => None,
        };

        GeneratedResponse {
            path,
            hash,
            headers,
            status,
            generated_at: OffsetDateTime::now_utc(),
            max_age,
            force_dynamic,
            body: OnceCell::new(),
            render,
        }
    }
}

fn render_payload(
    page: &Page,
    path: &str,
    params: &PathParams,
    payload: &DataValue,
) -> Result<String, PageError> {
    page.core().render(path, params, payload)
}

fn empty_hash(status: StatusCode, headers: &HeaderMap) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update("empty").update(status.as_str());
    for (name, value) in headers {
        hasher.update(name.as_str()).update(value.as_bytes());
    }
    hasher.digest()
}

/// The runtime-facing result of one `build` or `generate` call.
pub struct GeneratedResponse {
    path: String,
    hash: String,
    headers: HeaderMap,
    status: StatusCode,
    generated_at: OffsetDateTime,
    max_age: i64,
    force_dynamic: bool,
    body: OnceCell<Option<String>>,
    render: Option<RenderThunk>,
}

impl GeneratedResponse {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

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

    pub fn is_force_dynamic(&self) -> bool {
        self.force_dynamic
    }

    /// Rendered markup, computed at most once. `None` for empty responses.
    pub fn body(&self) -> Result<Option<&str>, PageError> {
        let Some(render) = &self.render else {
            return Ok(None);
        };
        self.body
            .get_or_try_init(|| render().map(Some))
            .map(Option::as_deref)
    }
}

impl fmt::Debug for GeneratedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedResponse")
            .field("path", &self.path)
            .field("hash", &self.hash)
            .field("status", &self.status)
            .field("generated_at", &self.generated_at)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}
