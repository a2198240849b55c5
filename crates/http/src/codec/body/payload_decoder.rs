//! Body framing dispatch.
//!
//! The request parser reports a [`PayloadSize`]; the connection turns it into a
//! [`PayloadDecoder`] and feeds it buffered bytes until it yields [`PayloadItem::Eof`].

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    NoBody,
}

impl PayloadDecoder {
    pub fn new(payload_size: PayloadSize, max_chunk_size: u32) -> Self {
        let kind = match payload_size {
            PayloadSize::Length(length) => Kind::Length(LengthDecoder::new(length)),
            PayloadSize::Chunked => Kind::Chunked(ChunkedDecoder::new(max_chunk_size)),
            PayloadSize::Empty => Kind::NoBody,
        };
        Self { kind }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    /// `Ok(None)` asks for more input. Bytes left in `src` after `Eof` belong to the next request.
    pub fn decode(&mut self, src: &mut Bytes) -> Result<Option<PayloadItem>, ParseError> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}
