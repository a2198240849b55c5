//! Incremental request-line and header parser.
//!
//! [`RequestParser`] is a byte-at-a-time state machine. It can be fed any fragmentation of the
//! input, down to single bytes, and produces the same [`Request`] as when fed the whole message
//! at once. Percent-escapes in the path, query and fragment are decoded inline, so no second
//! pass over the URL is needed.
//!
//! # Example
//!
//! ```
//! use rill_http::codec::{RequestParser, RequestState};
//! use rill_http::protocol::{Method, Request};
//!
//! let mut parser = RequestParser::default();
//! let mut request = Request::default();
//!
//! let (state, rest) = parser.feed(&mut request, b"GET /hello%20world?a=b+c HTTP/1.1\r\n").unwrap();
//! assert_eq!(state, RequestState::Pending);
//! assert!(rest.is_empty());
//!
//! let (state, _) = parser.feed(&mut request, b"Host: example.com\r\n\r\n").unwrap();
//! assert_eq!(state, RequestState::RequestCompleted);
//! assert_eq!(request.method(), Method::Get);
//! assert_eq!(request.path(), "/hello world");
//! assert_eq!(request.query().get("a"), Some("b c"));
//! ```

use std::mem;
use std::sync::Arc;

use tracing::trace;

use crate::codec::content_decoders::{ContentDecoders, IDENTITY};
use crate::config::Limits;
use crate::protocol::{ConnectionOption, Method, ParseError, PayloadSize, Protocol, Request};
use crate::utils::ensure;

/// Outcome of one [`RequestParser::feed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// All input consumed, the request is not complete yet.
    Pending,
    /// Headers are complete and a body follows; the leftover belongs to the body.
    HeadersCompleted,
    /// The request has no body and is complete; the parser has been reset.
    RequestCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Method,
    Path,
    PathDecode1,
    PathDecode2,
    Query,
    QueryDecode1,
    QueryDecode2,
    Fragment,
    FragmentDecode1,
    FragmentDecode2,
    Proto,
    ProtoCr,
    /// At the start of a header line, after the request line or a header.
    HeaderStart,
    HeaderKey,
    HeaderColon,
    HeaderValue,
    HeaderValueCr,
    /// CR of the empty line ending the header section.
    HeadersEndCr,
    Body,
}

/// Where a percent-decoded URL part ends up.
#[derive(Debug, Clone, Copy)]
enum UrlPart {
    Path,
    Query,
    Fragment,
}

/// The longest protocol token accepted, `HTTP/1.1`.
const MAX_PROTO_LEN: usize = 8;

/// Parses request heads into a connection-owned [`Request`].
///
/// Accumulation buffers live in the parser and keep their capacity across requests.
#[derive(Debug)]
pub struct RequestParser {
    state: State,
    limits: Limits,
    decoders: Arc<ContentDecoders>,

    buf: Vec<u8>,
    key: Vec<u8>,
    hex: u8,
    url_length: usize,
    headers_count: usize,
    content_length: Option<u64>,
    chunked: bool,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new(Limits::default(), Arc::new(ContentDecoders::default()))
    }
}

impl RequestParser {
    pub fn new(limits: Limits, decoders: Arc<ContentDecoders>) -> Self {
        Self {
            state: State::Method,
            limits,
            decoders,
            buf: Vec::with_capacity(64),
            key: Vec::with_capacity(32),
            hex: 0,
            url_length: 0,
            headers_count: 0,
            content_length: None,
            chunked: false,
        }
    }

    /// Feeds the next fragment of input.
    ///
    /// Returns the new state together with the bytes that were not consumed: after
    /// [`RequestState::HeadersCompleted`] they are the beginning of the body, after
    /// [`RequestState::RequestCompleted`] the beginning of the next pipelined request.
    /// While [`RequestState::Pending`] is returned the leftover is always empty.
    ///
    /// Once the body of a request has been read, call [`RequestParser::finish_body`] before
    /// feeding the next request.
    pub fn feed<'a>(&mut self, request: &mut Request, data: &'a [u8]) -> Result<(RequestState, &'a [u8]), ParseError> {
        for (i, &b) in data.iter().enumerate() {
            match self.state {
                State::Method => self.on_method(request, b)?,
                State::Path => self.on_url(request, b, UrlPart::Path)?,
                State::Query => self.on_url(request, b, UrlPart::Query)?,
                State::Fragment => self.on_url(request, b, UrlPart::Fragment)?,
                State::PathDecode1 | State::QueryDecode1 | State::FragmentDecode1 => self.on_decode_high(b)?,
                State::PathDecode2 | State::QueryDecode2 | State::FragmentDecode2 => self.on_decode_low(b)?,
                State::Proto => self.on_proto(request, b)?,
                State::ProtoCr | State::HeaderValueCr => {
                    ensure!(b == b'\n', ParseError::bad_request("expected LF after CR"));
                    self.state = State::HeaderStart;
                }
                State::HeaderStart => match b {
                    b'\r' => self.state = State::HeadersEndCr,
                    b'\n' => return self.on_headers_end(request, &data[i + 1..]),
                    _ => {
                        self.state = State::HeaderKey;
                        self.on_header_key(b)?;
                    }
                },
                State::HeadersEndCr => {
                    ensure!(b == b'\n', ParseError::bad_request("expected LF after CR"));
                    return self.on_headers_end(request, &data[i + 1..]);
                }
                State::HeaderKey => self.on_header_key(b)?,
                State::HeaderColon => match b {
                    b' ' | b'\t' => self.state = State::HeaderValue,
                    _ => {
                        self.state = State::HeaderValue;
                        self.on_header_value(request, b)?;
                    }
                },
                State::HeaderValue => self.on_header_value(request, b)?,
                State::Body => return Ok((RequestState::HeadersCompleted, &data[i..])),
            }
        }

        let state = if self.state == State::Body { RequestState::HeadersCompleted } else { RequestState::Pending };
        Ok((state, &[]))
    }

    /// Leaves body mode once the body decoder reported the end of the body.
    pub fn finish_body(&mut self) {
        self.reset();
    }

    /// Whether the parser sits between requests with nothing buffered.
    pub fn is_idle(&self) -> bool {
        self.state == State::Method && self.buf.is_empty()
    }

    /// Returns to the initial state, keeping buffer capacity.
    pub fn reset(&mut self) {
        self.state = State::Method;
        self.buf.clear();
        self.key.clear();
        self.hex = 0;
        self.url_length = 0;
        self.headers_count = 0;
        self.content_length = None;
        self.chunked = false;
    }

    fn on_method(&mut self, request: &mut Request, b: u8) -> Result<(), ParseError> {
        match b {
            // empty lines before the request line are skipped
            b'\r' | b'\n' if self.buf.is_empty() => Ok(()),
            b' ' => {
                ensure!(!self.buf.is_empty(), ParseError::bad_request("empty method"));
                let method = Method::from_bytes(&self.buf);
                ensure!(method != Method::Unknown, ParseError::bad_request("unknown method"));
                request.set_method(method);
                self.buf.clear();
                self.state = State::Path;
                Ok(())
            }
            _ => {
                ensure!(self.buf.len() < Method::MAX_LEN, ParseError::bad_request("method too long"));
                self.buf.push(b);
                Ok(())
            }
        }
    }

    fn on_url(&mut self, request: &mut Request, b: u8, part: UrlPart) -> Result<(), ParseError> {
        match (b, part) {
            (b' ', _) => {
                ensure!(
                    !(matches!(part, UrlPart::Path) && self.url_length == 0),
                    ParseError::bad_request("empty request target")
                );
                self.finish_url_part(request, part)?;
                self.state = State::Proto;
            }
            (b'?', UrlPart::Path) => {
                self.finish_url_part(request, part)?;
                self.state = State::Query;
            }
            (b'#', UrlPart::Path | UrlPart::Query) => {
                self.finish_url_part(request, part)?;
                self.state = State::Fragment;
            }
            (b'%', _) => {
                self.count_url_byte()?;
                self.state = match part {
                    UrlPart::Path => State::PathDecode1,
                    UrlPart::Query => State::QueryDecode1,
                    UrlPart::Fragment => State::FragmentDecode1,
                };
            }
            (b, _) if is_control(b) => return Err(ParseError::bad_request("control character in request target")),
            (b, _) => {
                self.count_url_byte()?;
                self.buf.push(if b == b'+' && matches!(part, UrlPart::Query) { b' ' } else { b });
            }
        }
        Ok(())
    }

    fn on_decode_high(&mut self, b: u8) -> Result<(), ParseError> {
        self.count_url_byte()?;
        self.hex = hex_value(b).ok_or_else(|| ParseError::bad_request("invalid percent-encoding"))?;
        self.state = match self.state {
            State::PathDecode1 => State::PathDecode2,
            State::QueryDecode1 => State::QueryDecode2,
            _ => State::FragmentDecode2,
        };
        Ok(())
    }

    fn on_decode_low(&mut self, b: u8) -> Result<(), ParseError> {
        self.count_url_byte()?;
        let low = hex_value(b).ok_or_else(|| ParseError::bad_request("invalid percent-encoding"))?;
        self.buf.push((self.hex << 4) | low);
        self.state = match self.state {
            State::PathDecode2 => State::Path,
            State::QueryDecode2 => State::Query,
            _ => State::Fragment,
        };
        Ok(())
    }

    fn count_url_byte(&mut self) -> Result<(), ParseError> {
        self.url_length += 1;
        ensure!(self.url_length <= self.limits.max_url_length, ParseError::uri_too_long(self.limits.max_url_length));
        Ok(())
    }

    fn finish_url_part(&mut self, request: &mut Request, part: UrlPart) -> Result<(), ParseError> {
        let decoded = std::str::from_utf8(&self.buf).map_err(|_invalid| ParseError::bad_request("request target is not valid utf-8"))?;
        let target = match part {
            UrlPart::Path => request.path_mut(),
            UrlPart::Query => request.query_mut(),
            UrlPart::Fragment => request.fragment_mut(),
        };
        target.clear();
        target.push_str(decoded);
        if matches!(part, UrlPart::Path) && target.is_empty() {
            target.push('/');
        }
        self.buf.clear();
        Ok(())
    }

    fn on_proto(&mut self, request: &mut Request, b: u8) -> Result<(), ParseError> {
        match b {
            b'\r' | b'\n' => {
                let protocol = Protocol::from_bytes(&self.buf).ok_or(ParseError::UnsupportedProtocol)?;
                request.set_protocol(protocol);
                self.buf.clear();
                self.state = if b == b'\r' { State::ProtoCr } else { State::HeaderStart };
                trace!(method = %request.method(), path = request.path(), %protocol, "parsed request line");
            }
            _ => {
                ensure!(self.buf.len() < MAX_PROTO_LEN, ParseError::UnsupportedProtocol);
                self.buf.push(b);
            }
        }
        Ok(())
    }

    fn on_header_key(&mut self, b: u8) -> Result<(), ParseError> {
        match b {
            b':' => {
                ensure!(!self.buf.is_empty(), ParseError::bad_request("empty header name"));
                mem::swap(&mut self.key, &mut self.buf);
                self.buf.clear();
                self.state = State::HeaderColon;
            }
            b'\r' | b'\n' => return Err(ParseError::bad_request("header line without colon")),
            b if is_control(b) || b == b' ' || b == b'\t' => return Err(ParseError::bad_request("invalid header name")),
            b => {
                ensure!(
                    self.buf.len() < self.limits.max_header_key_length,
                    ParseError::header_fields_too_large(format!("header name exceeds {} bytes", self.limits.max_header_key_length))
                );
                self.buf.push(b.to_ascii_lowercase());
            }
        }
        Ok(())
    }

    fn on_header_value(&mut self, request: &mut Request, b: u8) -> Result<(), ParseError> {
        match b {
            b'\r' | b'\n' => {
                self.finish_header(request)?;
                self.state = if b == b'\r' { State::HeaderValueCr } else { State::HeaderStart };
            }
            b => {
                ensure!(
                    self.buf.len() < self.limits.max_header_value_length,
                    ParseError::header_fields_too_large(format!("header value exceeds {} bytes", self.limits.max_header_value_length))
                );
                self.buf.push(b);
            }
        }
        Ok(())
    }

    fn finish_header(&mut self, request: &mut Request) -> Result<(), ParseError> {
        self.headers_count += 1;
        ensure!(
            self.headers_count <= self.limits.max_headers,
            ParseError::header_fields_too_large(format!("more than {} headers", self.limits.max_headers))
        );

        let end = self.buf.iter().rposition(|b| !matches!(b, b' ' | b'\t')).map_or(0, |p| p + 1);
        let value = std::str::from_utf8(&self.buf[..end])
            .map_err(|_invalid| ParseError::bad_request("header value is not valid utf-8"))?
            .to_owned();
        let key = String::from_utf8(mem::take(&mut self.key))
            .map_err(|_invalid| ParseError::bad_request("header name is not valid utf-8"))?;

        self.on_known_header(request, &key, &value)?;

        request.headers_mut().add(key, value);
        self.buf.clear();
        Ok(())
    }

    /// Reacts to framing-relevant headers; the key is already lower-cased.
    fn on_known_header(&mut self, request: &mut Request, key: &str, value: &str) -> Result<(), ParseError> {
        // compare lengths before bytes, most headers fall out on the length check
        match key.len() {
            14 if key == "content-length" => {
                let length = parse_content_length(value, self.limits.max_body_length)?;
                ensure!(
                    self.content_length.is_none_or(|previous| previous == length),
                    ParseError::bad_request("conflicting content-length headers")
                );
                self.content_length = Some(length);
            }
            17 if key == "transfer-encoding" => {
                let last = value.rsplit(',').next().unwrap_or_default().trim();
                ensure!(last.eq_ignore_ascii_case("chunked"), ParseError::bad_request("unsupported transfer-encoding"));
                self.chunked = true;
            }
            10 if key == "connection" => {
                for token in value.split(',').map(str::trim) {
                    if token.eq_ignore_ascii_case("close") {
                        request.set_connection(ConnectionOption::Close);
                    } else if token.eq_ignore_ascii_case("keep-alive") && request.connection() != ConnectionOption::Close {
                        request.set_connection(ConnectionOption::KeepAlive);
                    }
                }
            }
            16 if key == "content-encoding" => {
                let token = value.trim().to_ascii_lowercase();
                ensure!(self.decoders.supports(&token), ParseError::unsupported_encoding(token));
                request.set_content_encoding(if token == IDENTITY { None } else { Some(token) });
            }
            6 if key == "expect" => {
                request.set_expect_continue(value.trim().eq_ignore_ascii_case("100-continue"));
            }
            _ => {}
        }
        Ok(())
    }

    fn on_headers_end<'a>(&mut self, request: &mut Request, rest: &'a [u8]) -> Result<(RequestState, &'a [u8]), ParseError> {
        // chunked framing wins over any content-length
        let payload_size = match (self.chunked, self.content_length) {
            (true, _) => PayloadSize::Chunked,
            (false, Some(length)) if length > 0 => PayloadSize::Length(length),
            _ => PayloadSize::Empty,
        };
        request.set_payload_size(payload_size);
        trace!(headers = self.headers_count, ?payload_size, "parsed request headers");

        if payload_size.is_empty() {
            self.reset();
            Ok((RequestState::RequestCompleted, rest))
        } else {
            self.state = State::Body;
            Ok((RequestState::HeadersCompleted, rest))
        }
    }
}

fn parse_content_length(value: &str, max_body_length: u64) -> Result<u64, ParseError> {
    let value = value.trim();
    ensure!(
        !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
        ParseError::bad_request(format!("invalid content-length: {value}"))
    );
    let length = value
        .bytes()
        .try_fold(0u64, |acc, b| acc.checked_mul(10)?.checked_add(u64::from(b - b'0')))
        .ok_or_else(|| ParseError::too_large("content-length overflows"))?;
    ensure!(length <= max_body_length, ParseError::too_large(format!("content-length {length} exceeds {max_body_length}")));
    Ok(length)
}

#[inline]
fn is_control(b: u8) -> bool {
    b < 0x20 || b == 0x7f
}

#[inline]
fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
