//! Request body framing.
//!
//! [`LengthDecoder`] counts down a `Content-Length`, [`ChunkedDecoder`] walks chunk heads and
//! [`PayloadDecoder`] picks between them. Output spans are zero-copy slices of the input, and
//! what is left once a decoder reports EOF belongs to the next pipelined request.

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;

pub use chunked_decoder::ChunkedDecoder;
pub use length_decoder::LengthDecoder;
pub use payload_decoder::PayloadDecoder;
