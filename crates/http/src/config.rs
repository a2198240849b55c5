//! Numeric limits and connection settings.
//!
//! Nothing here is read from files or the environment; embedders pass values in through
//! [`ConnectionConfig`] (or the web crate's server builder) and get the defaults below
//! otherwise.

use std::time::Duration;

use crate::protocol::Headers;

/// Upper bounds enforced while parsing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Raw bytes of path, query and fragment together.
    pub max_url_length: usize,
    pub max_header_key_length: usize,
    pub max_header_value_length: usize,
    pub max_headers: usize,
    /// Largest accepted `Content-Length`.
    pub max_body_length: u64,
    /// Largest accepted size of a single chunk.
    pub max_chunk_size: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_url_length: 2048,
            max_header_key_length: 100,
            max_header_value_length: 8192,
            max_headers: 100,
            max_body_length: u64::from(u32::MAX),
            max_chunk_size: 8 * 1024 * 1024,
        }
    }
}

/// Per-connection settings for [`HttpConnection`](crate::connection::HttpConnection).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub limits: Limits,
    /// Capacity reserved for each socket read.
    pub read_buffer_size: usize,
    /// Idle time after which a read gives up; `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    /// Headers added to every response unless the response sets them itself.
    pub default_headers: Headers,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let mut default_headers = Headers::with_capacity(1);
        default_headers.add("Server", concat!("rill/", env!("CARGO_PKG_VERSION")));
        Self {
            limits: Limits::default(),
            read_buffer_size: 8 * 1024,
            read_timeout: Some(Duration::from_secs(90)),
            write_timeout: Some(Duration::from_secs(30)),
            default_headers,
        }
    }
}
