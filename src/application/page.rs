//! Compiled pages: a route pattern plus the author-supplied operations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, Uri, header::COOKIE};
use bytes::Bytes;
use tracing::debug;

use crate::domain::{
    data::DataValue,
    error::{DescriptorError, RouteError},
    response::ResponseValue,
    route::{PathParams, RoutePattern},
};

use super::error::{BoxError, PageError, PageOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Static,
    Dynamic,
}

/// Per-request values provided by the host (middleware output, locals).
pub type RequestState = BTreeMap<String, DataValue>;

/// Session values, when the host manages sessions.
pub type SessionData = BTreeMap<String, DataValue>;

/// HTTP-shaped request handed to `generate`.
#[derive(Debug, Clone)]
pub struct PageRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl PageRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(uri: &'static str) -> Self {
        Self::new(Method::GET, Uri::from_static(uri))
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// GET and HEAD never change server state.
    pub fn is_read_only(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

pub struct RenderContext<'a> {
    pub route: &'a str,
    pub path: &'a str,
    pub params: &'a PathParams,
    pub data: &'a DataValue,
}

pub struct BuildContext<'a> {
    pub path: &'a str,
    pub params: &'a PathParams,
}

pub struct GenerateContext<'a> {
    pub request: &'a PageRequest,
    pub path: &'a str,
    pub params: &'a PathParams,
    pub state: &'a RequestState,
    pub session: Option<&'a SessionData>,
}

/// What a page author supplies. Everything but `route` and `render` has a default:
/// one build path without params, and an empty record as data.
#[async_trait]
pub trait PageDescriptor: Send + Sync + 'static {
    fn route(&self) -> &str;

    fn kind(&self) -> PageKind {
        PageKind::Static
    }

    /// Only serve the paths enumerated by `get_build_paths`. Static pages only.
    fn strict_paths(&self) -> bool {
        false
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, BoxError>;

    async fn get_build_paths(&self) -> Result<Vec<PathParams>, BoxError> {
        Ok(vec![PathParams::new()])
    }

    async fn build(&self, _ctx: BuildContext<'_>) -> Result<Option<ResponseValue>, BoxError> {
        Ok(Some(ResponseValue::data(DataValue::empty_record())))
    }

    async fn generate(
        &self,
        _ctx: GenerateContext<'_>,
    ) -> Result<Option<ResponseValue>, BoxError> {
        Ok(Some(ResponseValue::data(DataValue::empty_record())))
    }
}

/// State every page variant shares.
pub struct PageCore {
    pattern: RoutePattern,
    module_id: String,
    descriptor: Arc<dyn PageDescriptor>,
}

impl PageCore {
    pub fn route(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn compile(&self, params: &PathParams) -> Result<String, RouteError> {
        self.pattern.compile(params)
    }

    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        self.pattern.matches(path)
    }

    pub fn render(
        &self,
        path: &str,
        params: &PathParams,
        data: &DataValue,
    ) -> Result<String, PageError> {
        debug!(route = self.route(), path, params = %params, "rendering page");
        let ctx = RenderContext {
            route: self.route(),
            path,
            params,
            data,
        };
        self.descriptor
            .render(&ctx)
            .map_err(|err| PageError::wrap(self.route(), params, PageOperation::Render, err))
    }

    pub async fn generate(
        &self,
        ctx: GenerateContext<'_>,
    ) -> Result<Option<ResponseValue>, PageError> {
        debug!(
            route = self.route(),
            path = ctx.path,
            params = %ctx.params,
            method = %ctx.request.method(),
            "generating page"
        );
        let params = ctx.params;
        self.descriptor
            .generate(ctx)
            .await
            .map_err(|err| PageError::wrap(self.route(), params, PageOperation::Generate, err))
    }
}

pub struct StaticPage {
    core: PageCore,
    strict_paths: bool,
}

impl StaticPage {
    pub fn strict_paths(&self) -> bool {
        self.strict_paths
    }

    pub async fn get_build_paths(&self) -> Result<Vec<PathParams>, PageError> {
        debug!(route = self.core.route(), "enumerating build paths");
        self.core
            .descriptor
            .get_build_paths()
            .await
            .map_err(|err| {
                PageError::wrap(
                    self.core.route(),
                    &PathParams::new(),
                    PageOperation::BuildPaths,
                    err,
                )
            })
    }

    pub async fn build(
        &self,
        ctx: BuildContext<'_>,
    ) -> Result<Option<ResponseValue>, PageError> {
        debug!(
            route = self.core.route(),
            path = ctx.path,
            params = %ctx.params,
            "building page"
        );
        let params = ctx.params;
        self.core
            .descriptor
            .build(ctx)
            .await
            .map_err(|err| PageError::wrap(self.core.route(), params, PageOperation::Build, err))
    }
}

pub struct DynamicPage {
    core: PageCore,
}

/// A compiled page. Immutable once compiled.
pub enum Page {
    Static(StaticPage),
    Dynamic(DynamicPage),
}

impl Page {
    /// Validate a descriptor and compile its route. Malformed descriptors fail here,
    /// never at request time.
    pub fn compile(
        descriptor: Arc<dyn PageDescriptor>,
        module_id: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        let module_id = module_id.into();
        let route = descriptor.route().to_string();

        if module_id.trim().is_empty() {
            return Err(DescriptorError::validation(
                &route,
                "module identity must not be empty",
            ));
        }

        let pattern = RoutePattern::parse(&route)?;
        let kind = descriptor.kind();
        let strict_paths = descriptor.strict_paths();

        if kind == PageKind::Dynamic && strict_paths {
            return Err(DescriptorError::validation(
                &route,
                "strict paths only apply to static pages",
            ));
        }

        let core = PageCore {
            pattern,
            module_id,
            descriptor,
        };

        Ok(match kind {
            PageKind::Static => Page::Static(StaticPage { core, strict_paths }),
            PageKind::Dynamic => Page::Dynamic(DynamicPage { core }),
        })
    }

    pub fn core(&self) -> &PageCore {
        match self {
            Page::Static(page) => &page.core,
            Page::Dynamic(page) => &page.core,
        }
    }

    pub fn kind(&self) -> PageKind {
        match self {
            Page::Static(_) => PageKind::Static,
            Page::Dynamic(_) => PageKind::Dynamic,
        }
    }

    pub fn as_static(&self) -> Option<&StaticPage> {
        match self {
            Page::Static(page) => Some(page),
            Page::Dynamic(_) => None,
        }
    }

    pub fn route(&self) -> &str {
        self.core().route()
    }

    pub fn module_id(&self) -> &str {
        self.core().module_id()
    }

    pub fn compile_path(&self, params: &PathParams) -> Result<String, RouteError> {
        self.core().compile(params)
    }

    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        self.core().match_path(path)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("route", &self.route())
            .field("kind", &self.kind())
            .field("module_id", &self.module_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use axum::http::HeaderValue;

    use super::*;

    struct Minimal {
        route: &'static str,
        kind: PageKind,
        strict: bool,
    }

    #[async_trait]
    impl PageDescriptor for Minimal {
        fn route(&self) -> &str {
            self.route
        }

        fn kind(&self) -> PageKind {
            self.kind
        }

        fn strict_paths(&self) -> bool {
            self.strict
        }

        fn render(&self, ctx: &RenderContext<'_>) -> Result<String, BoxError> {
            if ctx.path == "/fail" {
                return Err(Box::new(io::Error::other("render failed")));
            }
            Ok(format!("<p>{}</p>", ctx.path))
        }
    }

    fn minimal(route: &'static str) -> Arc<dyn PageDescriptor> {
        Arc::new(Minimal {
            route,
            kind: PageKind::Static,
            strict: false,
        })
    }

    #[test]
    fn compile_fails_fast_on_malformed_route() {
        let err = Page::compile(minimal("no-slash"), "m").expect_err("malformed");
        assert!(matches!(err, DescriptorError::Route(_)));
    }

    #[test]
    fn compile_rejects_strict_dynamic_pages_and_empty_module() {
        let descriptor = Arc::new(Minimal {
            route: "/live",
            kind: PageKind::Dynamic,
            strict: true,
        });
        assert!(matches!(
            Page::compile(descriptor, "m"),
            Err(DescriptorError::Validation { .. })
        ));
        assert!(Page::compile(minimal("/"), "  ").is_err());
    }

    #[tokio::test]
    async fn defaults_apply_when_author_omits_operations() {
        let page = Page::compile(minimal("/:slug?"), "m").expect("compiles");
        let Page::Static(static_page) = &page else {
            panic!("expected static page");
        };

        let paths = static_page.get_build_paths().await.expect("paths");
        assert_eq!(paths, vec![PathParams::new()]);

        let params = PathParams::new();
        let built = static_page
            .build(BuildContext {
                path: "/",
                params: &params,
            })
            .await
            .expect("build")
            .expect("default response");
        assert!(matches!(built.payload(), Some(DataValue::Record(fields)) if fields.is_empty()));
    }

    #[test]
    fn render_errors_carry_route_context() {
        let page = Page::compile(minimal("/:slug"), "m").expect("compiles");
        let params = PathParams::from([("slug", "fail")]);
        let err = page
            .core()
            .render("/fail", &params, &DataValue::Null)
            .expect_err("render fails");
        assert_eq!(err.route, "/:slug");
        assert_eq!(err.operation, PageOperation::Render);
    }

    #[test]
    fn request_helpers_read_query_and_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1; session=xyz"));
        let request = PageRequest::new(Method::POST, Uri::from_static("/x?force_refresh=t%2B1&b=2"))
            .with_headers(headers);

        assert_eq!(request.query_param("force_refresh").as_deref(), Some("t+1"));
        assert_eq!(request.cookie("session"), Some("xyz"));
        assert_eq!(request.cookie("missing"), None);
        assert!(!request.is_read_only());
    }
}
