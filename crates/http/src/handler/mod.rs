//! The request handler interface.
//!
//! A handler receives the connection-owned [`Request`] by mutable reference (so it can stream
//! the body and read routing parameters) and produces a [`Response`]. Failures are expressed as
//! responses; a handler that panics is the business of an outer recovery layer.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::protocol::{Request, Response};

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: &mut Request) -> Response;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn call(&self, req: &mut Request) -> Response {
        (**self).call(req).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Box<H> {
    async fn call(&self, req: &mut Request) -> Response {
        (**self).call(req).await
    }
}

/// A [`Handler`] backed by a closure, see [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, Response> + Send + Sync,
{
    async fn call(&self, req: &mut Request) -> Response {
        (self.f)(req).await
    }
}

/// Wraps a closure returning a boxed future into a [`Handler`].
///
/// ```
/// use rill_http::handler::make_handler;
/// use rill_http::protocol::Response;
///
/// let handler = make_handler(|req| Box::pin(async move { Response::text(format!("hello {}", req.path())) }));
/// ```
pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, Response> + Send + Sync,
{
    HandlerFn { f }
}
