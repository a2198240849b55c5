use bytes::Bytes;

/// What a body decoder yields: a span of decoded body bytes or the end of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    Chunk(Bytes),
    Eof,
}

/// Body framing announced by the request head.
///
/// `Transfer-Encoding: chunked` wins over `Content-Length` when both are present.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PayloadSize {
    Length(u64),
    Chunked,
    /// No body phase at all.
    #[default]
    Empty,
}

impl PayloadItem {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        *self == PayloadSize::Chunked
    }

    /// True when the request has no body bytes to read, `Content-Length: 0` included.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty | PayloadSize::Length(0))
    }
}
