//! Conversion of handler return values into responses.
//!
//! Handlers created with [`handler_fn`](crate::handler_fn) may return any [`Responder`]:
//! a finished [`Response`], text, bytes, a bare status, or combinations through tuples,
//! `Option` and `Result`.

use std::convert::Infallible;

use bytes::Bytes;
use http::StatusCode;
use rill_http::protocol::Response;

/// A value that can be turned into a [`Response`].
pub trait Responder {
    fn into_response(self) -> Response;
}

impl Responder for Response {
    fn into_response(self) -> Response {
        self
    }
}

/// Plain text, `200 OK`.
impl Responder for &'static str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl Responder for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

/// Raw bytes as `application/octet-stream`.
impl Responder for Bytes {
    fn into_response(self) -> Response {
        Response::new(StatusCode::OK)
            .with_header(http::header::CONTENT_TYPE.as_str(), mime::APPLICATION_OCTET_STREAM.as_ref())
            .with_body(self)
    }
}

impl Responder for Vec<u8> {
    fn into_response(self) -> Response {
        Bytes::from(self).into_response()
    }
}

/// The status with its reason phrase as body.
impl Responder for StatusCode {
    fn into_response(self) -> Response {
        Response::error(self)
    }
}

/// An empty `200 OK`.
impl Responder for () {
    fn into_response(self) -> Response {
        Response::new(StatusCode::OK)
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn into_response(self) -> Response {
        let (status, responder) = self;
        responder.into_response().with_status(status)
    }
}

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(t) => t.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// `None` answers `404 Not Found`.
impl<T: Responder> Responder for Option<T> {
    fn into_response(self) -> Response {
        match self {
            Some(t) => t.into_response(),
            None => Response::error(StatusCode::NOT_FOUND),
        }
    }
}

impl<T: Responder> Responder for Box<T> {
    fn into_response(self) -> Response {
        (*self).into_response()
    }
}

impl Responder for Infallible {
    fn into_response(self) -> Response {
        match self {}
    }
}
