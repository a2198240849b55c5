//! Request body delivery.
//!
//! The body of a request is decoded on the connection task while the handler runs. The two
//! sides meet in a single-slot rendezvous, the body gateway:
//!
//! - [`ReqBodySender`]: producer side, fed by the body decoder
//! - [`ReqBody`]: consumer side, handed to the handler through the request
//!
//! Each span travels with a oneshot acknowledgement and the producer waits for it before
//! decoding further, so a slow handler stalls reading from the socket instead of buffering the
//! body in memory. A decoding or transport failure is delivered through the same channel as
//! the terminal signal.
//!
//! When a handler returns without draining its body, the connection calls
//! [`ReqBody::finalize`] and discards the rest of the body from the wire, so the next
//! pipelined request starts at the right byte.

mod req_body;

pub use req_body::GatewayClosed;
pub use req_body::ReqBody;
pub use req_body::ReqBodySender;
