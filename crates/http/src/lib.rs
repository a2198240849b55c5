//! An embeddable HTTP/1.1 server engine
//!
//! This crate turns a bidirectional byte stream into a sequence of HTTP/1.1 exchanges. It
//! parses requests incrementally, streams their bodies to the handler with backpressure and
//! renders the handler's responses back, keeping the connection open for pipelined requests
//! while the protocol allows it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//! use rill_http::connection::HttpConnection;
//! use rill_http::handler::make_handler;
//! use rill_http::protocol::Response;
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(|req| {
//!         Box::pin(async move {
//!             match req.body_mut().text().await {
//!                 Ok(body) => Response::text(format!("{} received {} bytes", req.path(), body.len())),
//!                 Err(e) => Response::text(e.to_string()),
//!             }
//!         })
//!     }));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = Arc::clone(&handler);
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             match HttpConnection::new(reader, writer).process(handler).await {
//!                 Ok(()) => info!("finished process, connection shutdown"),
//!                 Err(e) => error!("service has error, cause {}, connection shutdown", e),
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: requests, responses, the header/parameter store, errors and the body gateway
//! - [`codec`]: the request parser, body decoders, content-decoder registry and renderer
//! - [`connection`]: the per-connection loop and the transport it reads from
//! - [`handler`]: the handler trait
//! - [`config`]: limits and connection settings
//!
//! ## Body streaming
//!
//! Request bodies are never buffered by the server. The connection decodes the body while the
//! handler runs and passes one span at a time through [`protocol::body::ReqBody`]; the decoder
//! does not read further until the handler asked for the next span. A handler that returns
//! without reading its body is fine: the connection drains the rest so the next pipelined
//! request parses from the right position.
//!
//! ## Error handling
//!
//! - [`protocol::HttpError`]: top-level error returned by [`connection::HttpConnection::process`]
//! - [`protocol::ParseError`]: request errors; protocol errors map to a status code
//! - [`protocol::SendError`]: response writing errors
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only, no upgrades
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Response bodies are constant byte buffers

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
