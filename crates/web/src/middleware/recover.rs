use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use http::StatusCode;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};
use tracing::error;

use crate::middleware::Middleware;

/// Catches panics raised by the rest of the chain and answers `500 Internal Server Error`.
///
/// Register it first (outermost) so it covers every other middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recover;

#[async_trait]
impl Middleware for Recover {
    async fn handle(&self, req: &mut Request, next: &dyn Handler) -> Response {
        match AssertUnwindSafe(next.call(req)).catch_unwind().await {
            Ok(resp) => resp,
            Err(panic) => {
                error!(cause = panic_message(panic.as_ref()), method = %req.method(), path = req.path(), "handler panicked");
                Response::error(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
