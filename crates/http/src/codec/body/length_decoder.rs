//! Body framing by `Content-Length`.

use bytes::Bytes;

use crate::protocol::{ParseError, PayloadItem};

/// Counts down a declared body length, handing out whatever part of it is buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    /// Splits the next body span off `src`.
    ///
    /// `Ok(None)` asks for more input. Once the count reaches zero every call reports
    /// [`PayloadItem::Eof`] and leaves `src` alone, so the bytes after the body stay available
    /// for the next request.
    pub fn decode(&mut self, src: &mut Bytes) -> Result<Option<PayloadItem>, ParseError> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let take = usize::try_from(self.remaining).map_or(src.len(), |remaining| remaining.min(src.len()));
        self.remaining -= take as u64;
        Ok(Some(PayloadItem::Chunk(src.split_to(take))))
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}
