//! The request object handed to handlers.
//!
//! One [`Request`] lives as long as its connection. The parser fills it, the handler reads it,
//! and [`Request::reset`] clears it for the next pipelined request while keeping the allocated
//! buffers around.

use std::sync::OnceLock;

use crate::protocol::body::ReqBody;
use crate::protocol::{Headers, Method, Params, PayloadSize, Protocol};

/// What the `Connection` header asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionOption {
    #[default]
    Unspecified,
    Close,
    KeepAlive,
}

/// The decoded query string and its lazily parsed parameters.
#[derive(Debug, Default)]
pub struct Query {
    raw: String,
    params: OnceLock<Params>,
}

impl Query {
    /// The percent-decoded query string, without the leading `?`.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parameters split out of the query on first use.
    pub fn params(&self) -> &Params {
        self.params.get_or_init(|| parse_params(&self.raw))
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params().get(key)
    }

    pub(crate) fn raw_mut(&mut self) -> &mut String {
        self.params.take();
        &mut self.raw
    }

    fn clear(&mut self) {
        self.raw.clear();
        self.params.take();
    }
}

fn parse_params(raw: &str) -> Params {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key, value),
            None => (pair, ""),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct Request {
    method: Method,
    path: String,
    query: Query,
    fragment: String,
    protocol: Protocol,
    headers: Headers,
    params: Params,
    body: ReqBody,

    payload_size: PayloadSize,
    connection: ConnectionOption,
    content_encoding: Option<String>,
    expect_continue: bool,
}

impl Request {
    /// Builds a request by hand, outside the parser.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), ..Self::default() }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        *self.query.raw_mut() = query.into();
        self
    }

    pub fn with_body(mut self, body: ReqBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// The percent-decoded path.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn query(&self) -> &Query {
        &self.query
    }

    #[inline]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Values bound to the wildcards of the matched route.
    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn body(&self) -> &ReqBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ReqBody {
        &mut self.body
    }

    /// How the body is framed on the wire.
    #[inline]
    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        match self.payload_size {
            PayloadSize::Length(length) => Some(length),
            PayloadSize::Empty => Some(0),
            PayloadSize::Chunked => None,
        }
    }

    /// Lower-cased `Content-Encoding` token, unless the body is sent as is.
    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    #[inline]
    pub fn connection(&self) -> ConnectionOption {
        self.connection
    }

    /// Whether the connection stays open after this request's response.
    pub fn keep_alive(&self) -> bool {
        match self.connection {
            ConnectionOption::Close => false,
            ConnectionOption::KeepAlive => true,
            ConnectionOption::Unspecified => self.protocol.keep_alive_by_default(),
        }
    }

    /// Whether the client waits for `100 Continue` before sending the body.
    #[inline]
    pub fn expects_continue(&self) -> bool {
        self.expect_continue
    }

    /// Clears every field for the next request while keeping allocations.
    pub fn reset(&mut self) {
        self.method = Method::default();
        self.path.clear();
        self.query.clear();
        self.fragment.clear();
        self.protocol = Protocol::default();
        self.headers.clear();
        self.params.clear();
        self.body = ReqBody::empty();
        self.payload_size = PayloadSize::Empty;
        self.connection = ConnectionOption::Unspecified;
        self.content_encoding = None;
        self.expect_continue = false;
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn path_mut(&mut self) -> &mut String {
        &mut self.path
    }

    pub(crate) fn query_mut(&mut self) -> &mut String {
        self.query.raw_mut()
    }

    pub(crate) fn fragment_mut(&mut self) -> &mut String {
        &mut self.fragment
    }

    pub(crate) fn set_protocol(&mut self, protocol: Protocol) {
        self.protocol = protocol;
    }

    pub(crate) fn set_payload_size(&mut self, payload_size: PayloadSize) {
        self.payload_size = payload_size;
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionOption) {
        self.connection = connection;
    }

    pub(crate) fn set_content_encoding(&mut self, token: Option<String>) {
        self.content_encoding = token;
    }

    pub(crate) fn set_expect_continue(&mut self, expect_continue: bool) {
        self.expect_continue = expect_continue;
    }

    pub(crate) fn set_body(&mut self, body: ReqBody) {
        self.body = body;
    }
}
