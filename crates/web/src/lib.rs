//! Routing, middleware and a TCP server on top of [`rill_http`].
//!
//! ```no_run
//! use futures::FutureExt;
//! use rill_web::date::DateHeader;
//! use rill_web::middleware::Recover;
//! use rill_web::router::{get, post, Group, Router};
//! use rill_web::{handler_fn, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::builder()
//!         .wrap(Recover)
//!         .wrap(DateHeader::new())
//!         .route("/", get(handler_fn(|_req| async { "hello world" }.boxed())))
//!         .group(
//!             Group::new("/users")
//!                 .route("/{id}", get(handler_fn(|req| {
//!                     async move { format!("user {}", req.params().get("id").unwrap_or_default()) }.boxed()
//!                 })))
//!                 .route("/", post(handler_fn(|req| async move { req.body_mut().text().await.map_err(|e| e.to_string()) }.boxed()))),
//!         )
//!         .build()
//!         .expect("routes are valid");
//!
//!     let server = Server::builder().address("127.0.0.1:8080").router(router).build().expect("server config is valid");
//!     server.start().await.expect("server runs");
//! }
//! ```

mod handler;
mod server;

pub mod date;
pub mod encoding;
pub mod middleware;
pub mod responder;
pub mod router;

pub use handler::handler_fn;
pub use handler::FnHandler;
pub use responder::Responder;
pub use router::Router;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;

pub use rill_http::handler::Handler;
pub use rill_http::protocol::{Method, Request, Response};
