//! Response serialization.
//!
//! The renderer writes the status line, the response's own headers, the default headers the
//! response did not override, a computed `Content-Length` and finally the body. Handlers never
//! set `Content-Length` themselves; a value they set is replaced by the real body length.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::StatusCode;
use tokio_util::codec::Encoder;

use crate::protocol::{Headers, Protocol, Response, SendError};

/// Initial buffer size reserved for the head of a response
const INIT_HEADER_SIZE: usize = 1024;

const CONTENT_LENGTH: &str = "content-length";
const TRANSFER_ENCODING: &str = "transfer-encoding";
const CONNECTION: &str = "connection";

/// A response together with what the renderer needs to know about its exchange.
#[derive(Debug, Clone, Copy)]
pub struct Outgoing<'a> {
    pub protocol: Protocol,
    pub response: &'a Response,
    /// Answering a HEAD request: keep the length, drop the body.
    pub head_only: bool,
    /// Value of the `Connection` header to announce, unless the response sets one.
    pub connection: Option<&'static str>,
}

/// Serializes responses, merging in a fixed set of default headers.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    default_headers: Headers,
}

impl Renderer {
    pub fn new(default_headers: Headers) -> Self {
        Self { default_headers }
    }

    pub fn default_headers(&self) -> &Headers {
        &self.default_headers
    }

    /// Appends the wire form of `outgoing` to `dst`.
    pub fn render(&self, outgoing: Outgoing<'_>, dst: &mut BytesMut) {
        let Outgoing { protocol, response, head_only, connection } = outgoing;
        let status = response.status();
        let headers = response.headers();
        let body = response.body();

        dst.reserve(INIT_HEADER_SIZE + if head_only { 0 } else { body.len() });

        let mut writer = FastWrite(dst);
        // writing into a BytesMut cannot fail
        let _ = write!(
            writer,
            "{} {} {}\r\n",
            protocol.as_str(),
            status.as_str(),
            status.canonical_reason().unwrap_or("Unknown Status")
        );

        for (key, value) in headers.iter().filter(|(key, _)| !key.eq_ignore_ascii_case(CONTENT_LENGTH)) {
            put_header(dst, key, value);
        }

        for (key, value) in self.default_headers.iter().filter(|(key, _)| !headers.contains(key)) {
            put_header(dst, key, value);
        }

        if let Some(connection) = connection.filter(|_| !headers.contains(CONNECTION)) {
            put_header(dst, "Connection", connection);
        }

        let bodiless = has_no_body(status);
        let streamed = headers.contains(TRANSFER_ENCODING);
        if !bodiless && !streamed {
            let _ = write!(FastWrite(dst), "Content-Length: {}\r\n", body.len());
        }
        dst.put_slice(b"\r\n");

        if !bodiless && !head_only {
            dst.put_slice(body);
        }
    }
}

impl Encoder<Outgoing<'_>> for Renderer {
    type Error = SendError;

    fn encode(&mut self, item: Outgoing<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.render(item, dst);
        Ok(())
    }
}

/// Statuses that never carry a body or a length.
fn has_no_body(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

#[inline]
fn put_header(dst: &mut BytesMut, key: &str, value: &str) {
    dst.put_slice(key.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

/// Fast writer implementation for writing to BytesMut.
///
/// Space has been reserved up front, so formatting goes straight into the buffer.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn render(renderer: &Renderer, outgoing: Outgoing<'_>) -> String {
        let mut dst = BytesMut::new();
        renderer.render(outgoing, &mut dst);
        String::from_utf8(dst.to_vec()).unwrap()
    }

    fn outgoing(response: &Response) -> Outgoing<'_> {
        Outgoing { protocol: Protocol::Http11, response, head_only: false, connection: None }
    }

    fn renderer() -> Renderer {
        let mut defaults = Headers::new();
        defaults.add("Server", "rill");
        defaults.add("Content-Type", "application/octet-stream");
        Renderer::new(defaults)
    }

    #[test]
    fn renders_status_headers_and_body() {
        let response = Response::new(StatusCode::OK).with_header("Content-Type", "text/plain").with_body("hello");

        let expected = indoc! {"
            HTTP/1.1 200 OK\r
            Content-Type: text/plain\r
            Server: rill\r
            Content-Length: 5\r
            \r
            hello"};
        assert_eq!(render(&renderer(), outgoing(&response)), expected);
    }

    #[test]
    fn content_length_is_always_computed() {
        let response = Response::new(StatusCode::CREATED).with_header("content-length", "999").with_body("abc");

        let rendered = render(&Renderer::default(), outgoing(&response));
        assert_eq!(rendered, "HTTP/1.1 201 Created\r\nContent-Length: 3\r\n\r\nabc");
    }

    #[test]
    fn head_keeps_length_but_drops_body() {
        let response = Response::new(StatusCode::OK).with_body("hello");
        let outgoing = Outgoing { head_only: true, ..outgoing(&response) };

        assert_eq!(render(&Renderer::default(), outgoing), "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n");
    }

    #[test]
    fn echoes_protocol_and_announces_connection() {
        let response = Response::new(StatusCode::NOT_FOUND);
        let closing = Outgoing { protocol: Protocol::Http10, response: &response, head_only: false, connection: Some("close") };

        assert_eq!(
            render(&Renderer::default(), closing),
            "HTTP/1.0 404 Not Found\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"
        );

        let response = Response::new(StatusCode::OK).with_header("Connection", "upgrade");
        let upgrading = Outgoing { connection: Some("close"), ..outgoing(&response) };
        assert!(!render(&Renderer::default(), upgrading).contains("close"));
    }

    #[test]
    fn bodiless_statuses_skip_length() {
        let response = Response::new(StatusCode::NO_CONTENT).with_body("ignored");
        assert_eq!(render(&Renderer::default(), outgoing(&response)), "HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[test]
    fn streamed_responses_skip_length() {
        let response = Response::new(StatusCode::OK).with_header("Transfer-Encoding", "chunked").with_body("0\r\n\r\n");
        assert_eq!(
            render(&Renderer::default(), outgoing(&response)),
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n"
        );
    }

    #[test]
    fn encoder_appends() {
        let response = Response::new(StatusCode::OK);
        let mut renderer = Renderer::default();
        let mut dst = BytesMut::from(&b"HTTP/1.1 100 Continue\r\n\r\n"[..]);

        renderer.encode(outgoing(&response), &mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
    }
}
