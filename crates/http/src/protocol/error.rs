use http::StatusCode;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Failures while reading a request off the wire.
///
/// Protocol variants map to a status code through [`ParseError::status`]; transport variants
/// have none, they end the connection without a response.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("bad request: {reason}")]
    BadRequest { reason: String },

    #[error("request uri exceed the limit {max_size}")]
    UriTooLong { max_size: usize },

    #[error("header fields too large: {reason}")]
    HeaderFieldsTooLarge { reason: String },

    #[error("unsupported protocol version")]
    UnsupportedProtocol,

    #[error("payload too large: {reason}")]
    TooLarge { reason: String },

    #[error("unsupported content encoding: {token}")]
    UnsupportedEncoding { token: String },

    #[error("connection closed before the request completed")]
    ConnectionClosed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn bad_request<S: ToString>(str: S) -> Self {
        Self::BadRequest { reason: str.to_string() }
    }

    pub fn uri_too_long(max_size: usize) -> Self {
        Self::UriTooLong { max_size }
    }

    pub fn header_fields_too_large<S: ToString>(str: S) -> Self {
        Self::HeaderFieldsTooLarge { reason: str.to_string() }
    }

    pub fn too_large<S: ToString>(str: S) -> Self {
        Self::TooLarge { reason: str.to_string() }
    }

    pub fn unsupported_encoding<S: ToString>(token: S) -> Self {
        Self::UnsupportedEncoding { token: token.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The status of the default error response, `None` for transport failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::BadRequest { .. } => Some(StatusCode::BAD_REQUEST),
            Self::UriTooLong { .. } => Some(StatusCode::URI_TOO_LONG),
            Self::HeaderFieldsTooLarge { .. } => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            Self::UnsupportedProtocol => Some(StatusCode::HTTP_VERSION_NOT_SUPPORTED),
            Self::TooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            Self::UnsupportedEncoding { .. } => Some(StatusCode::UNSUPPORTED_MEDIA_TYPE),
            Self::ConnectionClosed | Self::Io { .. } => None,
        }
    }
}

// io::Error is not Clone; the copy keeps kind and message
impl Clone for ParseError {
    fn clone(&self) -> Self {
        match self {
            Self::BadRequest { reason } => Self::BadRequest { reason: reason.clone() },
            Self::UriTooLong { max_size } => Self::UriTooLong { max_size: *max_size },
            Self::HeaderFieldsTooLarge { reason } => Self::HeaderFieldsTooLarge { reason: reason.clone() },
            Self::UnsupportedProtocol => Self::UnsupportedProtocol,
            Self::TooLarge { reason } => Self::TooLarge { reason: reason.clone() },
            Self::UnsupportedEncoding { token } => Self::UnsupportedEncoding { token: token.clone() },
            Self::ConnectionClosed => Self::ConnectionClosed,
            Self::Io { source } => Self::Io { source: io::Error::new(source.kind(), source.to_string()) },
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_carry_status() {
        assert_eq!(ParseError::bad_request("x").status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(ParseError::uri_too_long(10).status(), Some(StatusCode::URI_TOO_LONG));
        assert_eq!(ParseError::too_large("chunk").status(), Some(StatusCode::PAYLOAD_TOO_LARGE));
        assert_eq!(ParseError::UnsupportedProtocol.status(), Some(StatusCode::HTTP_VERSION_NOT_SUPPORTED));
    }

    #[test]
    fn transport_errors_have_no_status() {
        assert_eq!(ParseError::ConnectionClosed.status(), None);
        assert_eq!(ParseError::io(io::Error::from(io::ErrorKind::BrokenPipe)).status(), None);
    }
}
