//! axum binding of the engine port.

use super::{wrap, HandlerFn, HttpEngine, MiddlewareFn, RequestContext, Route};
use crate::response::Reply;
use crate::error::CrudError;
use crate::settings::Settings;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{RawPathParams, RawQuery},
    http::{HeaderMap, Method, Uri},
    response::IntoResponse,
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct AxumEngine {
    bind: String,
    body_limit: usize,
    routes: Vec<Route>,
    handlers: Vec<HandlerFn>,
    middlewares: Vec<MiddlewareFn>,
}

impl AxumEngine {
    pub fn new(bind: impl Into<String>) -> Self {
        AxumEngine {
            bind: bind.into(),
            body_limit: Settings::DEFAULT_BODY_LIMIT,
            routes: Vec::new(),
            handlers: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        AxumEngine::new(settings.bind.clone()).with_body_limit(settings.body_limit)
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Router with every registered route; routes sharing a path share one method router.
    pub fn into_router(self) -> Router {
        let mut by_path: Vec<(String, MethodRouter)> = Vec::new();
        for (route, handler) in self.routes.into_iter().zip(self.handlers) {
            let Some(filter) = method_filter(&route.method) else {
                continue;
            };
            let handler = self
                .middlewares
                .iter()
                .rev()
                .fold(handler, |inner, mw| wrap(mw, inner));
            let endpoint = move |params: Option<RawPathParams>,
                                 RawQuery(raw_query): RawQuery,
                                 method: Method,
                                 uri: Uri,
                                 headers: HeaderMap,
                                 body: Bytes| {
                let handler = handler.clone();
                async move {
                    let query = match parse_query(raw_query.as_deref()) {
                        Ok(query) => query,
                        Err(e) => return Reply::from(e).into_response(),
                    };
                    let request_id = headers
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(String::from)
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                    let mut ctx = RequestContext::new(method.clone(), uri.path())
                        .with_query(query)
                        .with_headers(headers)
                        .with_body(body);
                    if let Some(params) = &params {
                        for (name, value) in params {
                            ctx = ctx.with_path_param(name, value);
                        }
                    }
                    ctx.scope_mut().request_id = Some(request_id.clone());
                    let reply = handler(ctx).await;
                    tracing::debug!(
                        request_id = %request_id,
                        method = %method,
                        path = %uri.path(),
                        status = reply.status.as_u16(),
                        "request"
                    );
                    reply.into_response()
                }
            };
            match by_path.iter_mut().find(|(path, _)| *path == route.path) {
                Some((_, router)) => {
                    let merged = std::mem::take(router).on(filter, endpoint);
                    *router = merged;
                }
                None => by_path.push((route.path, on(filter, endpoint))),
            }
        }
        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, methods)| router.route(&path, methods))
            .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(self.body_limit)))
    }
}

/// Query pairs in request order. Rejections use the JSON error body like every other failure.
fn parse_query(raw: Option<&str>) -> Result<Vec<(String, String)>, CrudError> {
    serde_urlencoded::from_str(raw.unwrap_or_default())
        .map_err(|e| CrudError::Validation(format!("invalid query string: {}", e)))
}

fn method_filter(method: &Method) -> Option<MethodFilter> {
    Some(match *method {
        Method::GET => MethodFilter::GET,
        Method::POST => MethodFilter::POST,
        Method::PUT => MethodFilter::PUT,
        Method::PATCH => MethodFilter::PATCH,
        Method::DELETE => MethodFilter::DELETE,
        Method::HEAD => MethodFilter::HEAD,
        Method::OPTIONS => MethodFilter::OPTIONS,
        _ => return None,
    })
}

#[async_trait]
impl HttpEngine for AxumEngine {
    fn register_route(
        &mut self,
        method: Method,
        path: &str,
        handler: HandlerFn,
        record: &'static str,
        protected: bool,
    ) -> Result<(), CrudError> {
        if method_filter(&method).is_none() {
            return Err(CrudError::Validation(format!("unsupported HTTP method {}", method)));
        }
        if self.routes.iter().any(|r| r.method == method && r.path == path) {
            return Err(CrudError::Schema(format!("route {} {} registered twice", method, path)));
        }
        self.routes.push(Route {
            method,
            path: path.to_string(),
            record,
            protected,
        });
        self.handlers.push(handler);
        Ok(())
    }

    fn use_middleware(&mut self, middleware: MiddlewareFn) {
        self.middlewares.push(middleware);
    }

    fn routes(&self) -> &[Route] {
        &self.routes
    }

    async fn start(self) -> Result<(), CrudError> {
        let listener = TcpListener::bind(&self.bind).await?;
        tracing::info!("listening on {}", listener.local_addr()?);
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::handler_fn;

    fn noop() -> HandlerFn {
        handler_fn(|_ctx| async { Reply::no_content() })
    }

    #[test]
    fn routes_are_recorded_in_order() {
        let mut engine = AxumEngine::new("127.0.0.1:0");
        engine
            .register_route(Method::GET, "/test", noop(), "TestEntity", false)
            .unwrap();
        engine
            .register_route(Method::POST, "/test", noop(), "TestEntity", true)
            .unwrap();
        let routes = engine.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method, Method::GET);
        assert_eq!(routes[0].path, "/test");
        assert!(!routes[0].protected);
        assert!(routes[1].protected);
    }

    #[test]
    fn unsupported_method_is_an_error_not_a_panic() {
        let mut engine = AxumEngine::new("127.0.0.1:0");
        let foo = Method::from_bytes(b"FOO").unwrap();
        assert!(engine.register_route(foo, "/foo", noop(), "TestEntity", false).is_err());
        assert!(engine.routes().is_empty());
    }

    #[test]
    fn query_pairs_keep_order_and_repeats() {
        let pairs = parse_query(Some("sort=name&sort=-age&name=A%20B&flag")).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("sort".to_string(), "name".to_string()),
                ("sort".to_string(), "-age".to_string()),
                ("name".to_string(), "A B".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
        assert!(parse_query(None).unwrap().is_empty());
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let mut engine = AxumEngine::new("127.0.0.1:0");
        engine.register_route(Method::GET, "/a", noop(), "A", false).unwrap();
        assert!(engine.register_route(Method::GET, "/a", noop(), "A", false).is_err());
    }
}
