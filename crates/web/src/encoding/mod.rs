//! Request body content decoders backed by `flate2`.
//!
//! [`Gzip`] and [`Deflate`] are registered by [`ServerBuilder`](crate::ServerBuilder) under the
//! `gzip` and `deflate` tokens. Both decode incrementally: every encoded span is written into a
//! streaming decoder and whatever it produced so far is handed on.

use std::io;
use std::io::Write;
use std::mem;

use bytes::Bytes;
use flate2::write::{GzDecoder, ZlibDecoder};
use rill_http::codec::{ContentCoding, ContentDecoder};

/// `Content-Encoding: gzip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gzip;

/// `Content-Encoding: deflate`, the zlib format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deflate;

impl ContentCoding for Gzip {
    fn decoder(&self) -> Box<dyn ContentDecoder> {
        Box::new(StreamDecoder(GzDecoder::new(Vec::new())))
    }
}

impl ContentCoding for Deflate {
    fn decoder(&self) -> Box<dyn ContentDecoder> {
        Box::new(StreamDecoder(ZlibDecoder::new(Vec::new())))
    }
}

/// The write-side decoders of flate2 share this shape.
trait Inflate: Write + Send {
    fn output(&mut self) -> &mut Vec<u8>;
    fn try_finish(&mut self) -> io::Result<()>;
}

impl Inflate for GzDecoder<Vec<u8>> {
    fn output(&mut self) -> &mut Vec<u8> {
        self.get_mut()
    }

    fn try_finish(&mut self) -> io::Result<()> {
        GzDecoder::try_finish(self)
    }
}

impl Inflate for ZlibDecoder<Vec<u8>> {
    fn output(&mut self) -> &mut Vec<u8> {
        self.get_mut()
    }

    fn try_finish(&mut self) -> io::Result<()> {
        ZlibDecoder::try_finish(self)
    }
}

struct StreamDecoder<D>(D);

impl<D: Inflate> ContentDecoder for StreamDecoder<D> {
    fn decode(&mut self, encoded: Bytes) -> io::Result<Bytes> {
        self.0.write_all(&encoded)?;
        Ok(Bytes::from(mem::take(self.0.output())))
    }

    fn finish(&mut self) -> io::Result<Bytes> {
        self.0.try_finish()?;
        Ok(Bytes::from(mem::take(self.0.output())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;

    fn decode_in_pieces(coding: &dyn ContentCoding, encoded: &[u8], piece: usize) -> Vec<u8> {
        let mut decoder = coding.decoder();
        let mut decoded = Vec::new();
        for span in encoded.chunks(piece) {
            decoded.extend_from_slice(&decoder.decode(Bytes::copy_from_slice(span)).unwrap());
        }
        decoded.extend_from_slice(&decoder.finish().unwrap());
        decoded
    }

    fn sample() -> Vec<u8> {
        "the quick brown fox jumps over the lazy dog. ".repeat(200).into_bytes()
    }

    #[test]
    fn gzip_decodes_split_input() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&sample()).unwrap();
        let encoded = encoder.finish().unwrap();

        for piece in [1, 7, 512, encoded.len()] {
            assert_eq!(decode_in_pieces(&Gzip, &encoded, piece), sample());
        }
    }

    #[test]
    fn deflate_decodes_split_input() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&sample()).unwrap();
        let encoded = encoder.finish().unwrap();

        assert_eq!(decode_in_pieces(&Deflate, &encoded, 13), sample());
    }

    #[test]
    fn corrupt_gzip_is_an_error() {
        let mut decoder = Gzip.decoder();
        let result = decoder.decode(Bytes::from_static(b"definitely not gzip at all")).and_then(|_| decoder.finish());
        result.expect_err("corrupt input must not decode");
    }
}
