use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::BoxFuture;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};

use crate::responder::Responder;

/// A [`Handler`] backed by an async closure returning any [`Responder`].
pub struct FnHandler<F, R> {
    f: F,
    _phantom: PhantomData<fn() -> R>,
}

impl<F, R> fmt::Debug for FnHandler<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Creates a handler from a closure returning a boxed future.
///
/// ```
/// use futures::FutureExt;
/// use rill_web::handler_fn;
///
/// let greet = handler_fn(|req| {
///     async move {
///         let name = req.params().get("name").unwrap_or("stranger").to_owned();
///         let body = req.body_mut().text().await.unwrap_or_default();
///         format!("hello {name}, you sent {} bytes", body.len())
///     }
///     .boxed()
/// });
/// # drop(greet);
/// ```
pub fn handler_fn<F, R>(f: F) -> FnHandler<F, R>
where
    F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, R> + Send + Sync,
    R: Responder,
{
    FnHandler { f, _phantom: PhantomData }
}

#[async_trait]
impl<F, R> Handler for FnHandler<F, R>
where
    F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, R> + Send + Sync,
    R: Responder,
{
    async fn call(&self, req: &mut Request) -> Response {
        (self.f)(req).await.into_response()
    }
}
