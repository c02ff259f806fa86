//! HTTP engine port: how routes, handlers and middlewares are handed to a server.
//!
//! Handlers turn a [`RequestContext`] into a [`Reply`]. Middlewares receive the context and a
//! [`Next`]; calling [`Next::run`] continues to the handler, returning without it aborts the
//! request with the middleware's own reply.

mod axum_engine;
mod context;

pub use axum_engine::AxumEngine;
pub use context::{RequestContext, RequestScope, Subject};

use crate::error::CrudError;
use crate::response::Reply;
use async_trait::async_trait;
use axum::http::Method;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ReplyFuture = Pin<Box<dyn Future<Output = Reply> + Send>>;

pub type HandlerFn = Arc<dyn Fn(RequestContext) -> ReplyFuture + Send + Sync>;

pub type MiddlewareFn = Arc<dyn Fn(RequestContext, Next) -> ReplyFuture + Send + Sync>;

/// Remainder of the chain after a middleware.
pub struct Next {
    handler: HandlerFn,
}

impl Next {
    pub fn new(handler: HandlerFn) -> Self {
        Next { handler }
    }

    pub async fn run(self, ctx: RequestContext) -> Reply {
        (self.handler)(ctx).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext| -> ReplyFuture { Box::pin(f(ctx)) })
}

pub fn middleware_fn<F, Fut>(f: F) -> MiddlewareFn
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    Arc::new(move |ctx: RequestContext, next: Next| -> ReplyFuture { Box::pin(f(ctx, next)) })
}

/// Handler that runs `middleware` in front of `inner`.
pub fn wrap(middleware: &MiddlewareFn, inner: HandlerFn) -> HandlerFn {
    let middleware = Arc::clone(middleware);
    Arc::new(move |ctx: RequestContext| -> ReplyFuture { middleware(ctx, Next::new(Arc::clone(&inner))) })
}

/// One registered route, kept for introspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: String,
    /// Name of the record type served.
    pub record: &'static str,
    pub protected: bool,
}

#[async_trait]
pub trait HttpEngine: Send {
    fn register_route(
        &mut self,
        method: Method,
        path: &str,
        handler: HandlerFn,
        record: &'static str,
        protected: bool,
    ) -> Result<(), CrudError>;

    /// Middleware applied to every route, outermost first in registration order.
    fn use_middleware(&mut self, middleware: MiddlewareFn);

    fn routes(&self) -> &[Route];

    async fn start(self) -> Result<(), CrudError>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn middleware_can_continue_or_abort() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let handler = handler_fn(move |_ctx| {
            counted.fetch_add(1, Ordering::SeqCst);
            async { Reply::no_content() }
        });

        let gate = middleware_fn(|ctx: RequestContext, next: Next| async move {
            if ctx.header("x-open").is_some() {
                next.run(ctx).await
            } else {
                Reply::error(StatusCode::FORBIDDEN, "closed")
            }
        });
        let guarded = wrap(&gate, handler);

        let denied = guarded(RequestContext::new(Method::GET, "/")).await;
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ctx = RequestContext::new(Method::GET, "/")
            .with_header(axum::http::HeaderName::from_static("x-open"), axum::http::HeaderValue::from_static("1"));
        let allowed = guarded(ctx).await;
        assert_eq!(allowed.status, StatusCode::NO_CONTENT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
