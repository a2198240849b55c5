//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module provides functionality to decode request bodies that use chunked transfer
//! encoding as specified in [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).
//!
//! Line endings are accepted as `CRLF` or a bare `LF`, the same leniency the request parser
//! applies to the head of the message.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, Bytes};
use std::task::Poll;
use tracing::trace;
use ChunkedState::*;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// The decoder processes incoming bytes according to the chunked format:
/// - Each chunk starts with its size in hexadecimal
/// - Followed by optional extensions and CR?LF
/// - Then the chunk data and CR?LF
/// - A zero-sized chunk indicates the end of the message, optionally followed by trailer
///   fields which are read and discarded
///
/// Chunk sizes are 32-bit and bounded by `max_chunk_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u32,
    max_chunk_size: u32,
}

impl ChunkedDecoder {
    /// Creates a new ChunkedDecoder instance.
    ///
    /// The decoder starts in the SizeStart state, ready to read the size of the first chunk.
    pub fn new(max_chunk_size: u32) -> Self {
        Self { state: SizeStart, remaining_size: 0, max_chunk_size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the first hex digit of the chunk size
    SizeStart,
    /// Read further hex digits of the chunk size
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Skip a trailer field
    Trailer,
    /// Read LF after trailer
    TrailerLf,
    /// Read final CR, or the start of a trailer field
    EndCr,
    /// Read final LF
    EndLf,
    /// Final state after reading last chunk
    End,
}

impl ChunkedDecoder {
    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when chunk data was read; the bytes are a slice
    ///   of `src`, no copy is made
    /// - `Ok(Some(PayloadItem::Eof))` when the final chunk is processed; whatever is left in
    ///   `src` belongs to the next request
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError)` if the chunked encoding is invalid
    pub fn decode(&mut self, src: &mut Bytes) -> Result<Option<PayloadItem>, ParseError> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                // need more data
                return Ok(None);
            }

            let mut buf = None;

            self.state = match self.state.step(src, &mut self.remaining_size, self.max_chunk_size, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.has_remaining() {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

impl ChunkedState {
    /// Processes the next step in the chunked decoding state machine.
    fn step(
        &self,
        src: &mut Bytes,
        remaining_size: &mut u32,
        max_chunk_size: u32,
        buf: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, ParseError>> {
        match self {
            SizeStart => ChunkedState::read_size_start(src, remaining_size, max_chunk_size),
            Size => ChunkedState::read_size(src, remaining_size, max_chunk_size),
            SizeLws => ChunkedState::read_size_lws(src, *remaining_size),
            Extension => ChunkedState::read_extension(src, *remaining_size),
            SizeLf => ChunkedState::read_size_lf(src, *remaining_size),
            Body => ChunkedState::read_body(src, remaining_size, buf),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// The first character of a size line must be a hex digit.
    fn read_size_start(src: &mut Bytes, size: &mut u32, max_chunk_size: u32) -> Poll<Result<ChunkedState, ParseError>> {
        let b = try_next_byte!(src);
        match hex_digit(b) {
            Some(digit) => {
                *size = 0;
                Poll::Ready(accumulate(size, digit, max_chunk_size).map(|()| Size))
            }
            None => Poll::Ready(Err(ParseError::bad_request("invalid chunk size line: expected hex digit"))),
        }
    }

    /// Reads further hex digits until the end of the size.
    ///
    /// # State Transitions
    /// - On hex digit: Stay in Size state to read more digits
    /// - On whitespace (tab/space): Transition to SizeLws state
    /// - On semicolon: Transition to Extension state to handle chunk extensions
    /// - On CR: Transition to SizeLf state to finish size line
    /// - On LF: The size line is complete
    /// - On invalid character: Return error
    fn read_size(src: &mut Bytes, size: &mut u32, max_chunk_size: u32) -> Poll<Result<ChunkedState, ParseError>> {
        let b = try_next_byte!(src);
        if let Some(digit) = hex_digit(b) {
            return Poll::Ready(accumulate(size, digit, max_chunk_size).map(|()| Size));
        }

        match b {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Ok(size_line_done(*size))),
            _ => Poll::Ready(Err(ParseError::bad_request("invalid chunk size line: invalid size"))),
        }
    }

    /// Processes linear whitespace (LWS) after the chunk size; no more digits may follow.
    fn read_size_lws(src: &mut Bytes, size: u32) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Ok(size_line_done(size))),
            _ => Poll::Ready(Err(ParseError::bad_request("invalid chunk size linear white space"))),
        }
    }

    /// Chunk extensions are read and ignored up to the end of the size line.
    fn read_extension(src: &mut Bytes, size: u32) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Ok(size_line_done(size))),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(src: &mut Bytes, size: u32) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(size_line_done(size))),
            _ => Poll::Ready(Err(ParseError::bad_request("invalid chunk size LF"))),
        }
    }

    /// Reads as much of the current chunk as is buffered, without copying.
    fn read_body(src: &mut Bytes, remaining: &mut u32, buf: &mut Option<Bytes>) -> Poll<Result<ChunkedState, ParseError>> {
        if src.is_empty() {
            return Poll::Ready(Ok(Body));
        }

        if *remaining == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        let read_size = std::cmp::min(*remaining as usize, src.len());
        // read_size is bounded by `remaining`, a u32
        *remaining -= read_size as u32;
        *buf = Some(src.split_to(read_size));

        if *remaining > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }

    fn read_body_cr(src: &mut Bytes) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            b'\n' => Poll::Ready(Ok(SizeStart)),
            _ => Poll::Ready(Err(ParseError::bad_request("chunk data longer than its declared size"))),
        }
    }

    fn read_body_lf(src: &mut Bytes) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(SizeStart)),
            _ => Poll::Ready(Err(ParseError::bad_request("invalid chunk body LF"))),
        }
    }

    fn read_trailer(src: &mut Bytes) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut Bytes) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Err(ParseError::bad_request("invalid trailer end LF"))),
        }
    }

    /// After the last chunk: an empty line ends the body, anything else starts a trailer field.
    fn read_end_cr(src: &mut Bytes) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut Bytes) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Err(ParseError::bad_request("invalid chunk end LF"))),
        }
    }
}

#[inline]
fn size_line_done(size: u32) -> ChunkedState {
    if size == 0 { EndCr } else { Body }
}

#[inline]
fn hex_digit(b: u8) -> Option<u32> {
    char::from(b).to_digit(16)
}

fn accumulate(size: &mut u32, digit: u32, max_chunk_size: u32) -> Result<(), ParseError> {
    *size = size
        .checked_mul(16)
        .and_then(|size| size.checked_add(digit))
        .ok_or_else(|| ParseError::too_large("chunk size overflows 32 bits"))?;
    if *size > max_chunk_size {
        return Err(ParseError::too_large(format!("chunk size exceeds {max_chunk_size}")));
    }
    Ok(())
}
