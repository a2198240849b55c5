//! Middleware: code that runs around a handler.
//!
//! A [`Middleware`] receives the request together with the next handler of the chain and
//! decides whether, when and how to call it. Chains are built once by [`compose`], when the
//! router is built, so serving a request walks a fixed chain of `Arc`s.
//!
//! - [`middleware_fn`]: a middleware from a closure
//! - [`Recover`]: turns a panicking handler into a `500 Internal Server Error`
//! - [`DateHeader`](crate::date::DateHeader): adds the `Date` header

mod recover;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};

pub use recover::Recover;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: &mut Request, next: &dyn Handler) -> Response;
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn handle(&self, req: &mut Request, next: &dyn Handler) -> Response {
        (**self).handle(req, next).await
    }
}

/// Wraps `handler` in `middlewares`, the first middleware ending up outermost.
pub fn compose(handler: Arc<dyn Handler>, middlewares: &[Arc<dyn Middleware>]) -> Arc<dyn Handler> {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| -> Arc<dyn Handler> { Arc::new(Wrapped { middleware: Arc::clone(middleware), next }) })
}

/// One link of a composed chain.
struct Wrapped {
    middleware: Arc<dyn Middleware>,
    next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for Wrapped {
    async fn call(&self, req: &mut Request) -> Response {
        self.middleware.handle(req, self.next.as_ref()).await
    }
}

/// A [`Middleware`] backed by a closure, see [`middleware_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, &'a dyn Handler) -> BoxFuture<'a, Response> + Send + Sync,
{
    async fn handle(&self, req: &mut Request, next: &dyn Handler) -> Response {
        (self.f)(req, next).await
    }
}

/// Creates a middleware from a closure returning a boxed future.
///
/// ```
/// use rill_web::middleware::middleware_fn;
///
/// let server_timing = middleware_fn(|req, next| {
///     Box::pin(async move {
///         let started = std::time::Instant::now();
///         let mut resp = next.call(req).await;
///         resp.headers_mut().set("Server-Timing", format!("app;dur={}", started.elapsed().as_millis()));
///         resp
///     })
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, &'a dyn Handler) -> BoxFuture<'a, Response> + Send + Sync,
{
    FnMiddleware { f }
}
