//! Cached `Date` header values.
//!
//! Formatting an HTTP date on every response is wasted work when thousands of responses share
//! the same second. [`DateService`] keeps the formatted value in an [`ArcSwap`] and refreshes it
//! from a background task; [`DateHeader`] owns one and copies its value into responses.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use rill_http::handler::Handler;
use rill_http::protocol::{Request, Response};
use tokio::task::JoinHandle;

use crate::middleware::Middleware;

/// Keeps the current HTTP date string, refreshed by a background task.
#[derive(Debug)]
pub struct DateService {
    current: Arc<ArcSwap<String>>,
    handle: JoinHandle<()>,
}

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(800);

impl DateService {
    /// Starts a service refreshing its value every `update_interval`. Must be called from
    /// within a tokio runtime.
    pub fn with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(http_date()));
        let refreshed = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(update_interval);
            loop {
                ticks.tick().await;
                refreshed.store(Arc::new(http_date()));
            }
        });

        DateService { current, handle }
    }

    /// The cached value, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
    pub fn current(&self) -> Arc<String> {
        self.current.load_full()
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn http_date() -> String {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Middleware setting the `Date` header on every response that lacks one.
///
/// The refresh task runs on the runtime that created the middleware and stops when the
/// middleware is dropped.
#[derive(Debug, Clone)]
pub struct DateHeader {
    service: Arc<DateService>,
}

impl DateHeader {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_service(DateService::with_update_interval(DEFAULT_UPDATE_INTERVAL))
    }

    pub fn with_service(service: DateService) -> Self {
        Self { service: Arc::new(service) }
    }
}

impl Default for DateHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for DateHeader {
    async fn handle(&self, req: &mut Request, next: &dyn Handler) -> Response {
        let mut resp = next.call(req).await;
        if !resp.headers().contains("date") {
            resp.headers_mut().set("Date", self.service.current().as_str());
        }
        resp
    }
}
