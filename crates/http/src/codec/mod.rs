//! Wire-level codecs for HTTP/1.x messages.
//!
//! - [`RequestParser`]: byte-at-a-time state machine for the request line and headers,
//!   percent-decoding the request target as it goes and detecting the body framing
//! - [`body`]: decoders for `Content-Length` and chunked request bodies
//! - [`ContentDecoders`]: `Content-Encoding` token registry consulted by the parser and the
//!   connection
//! - [`Renderer`]: serializes responses, implementing [`tokio_util::codec::Encoder`]
//!
//! # Example
//!
//! ```
//! use rill_http::codec::{RequestParser, RequestState};
//! use rill_http::protocol::Request;
//!
//! let mut parser = RequestParser::default();
//! let mut request = Request::default();
//!
//! let (state, rest) = parser.feed(&mut request, b"GET /a%20b?x=1 HTTP/1.1\r\nHost: example\r\n\r\n").unwrap();
//! assert_eq!(state, RequestState::RequestCompleted);
//! assert!(rest.is_empty());
//! assert_eq!(request.path(), "/a b");
//! assert_eq!(request.query().get("x"), Some("1"));
//! ```

pub mod body;
mod content_decoders;
mod renderer;
mod request_parser;

pub use content_decoders::{ContentCoding, ContentDecoder, ContentDecoders, IDENTITY};
pub use renderer::{Outgoing, Renderer};
pub use request_parser::{RequestParser, RequestState};
