//! HTTP connection handling module
//!
//! - [`HttpConnection`]: drives one client connection, from parsing pipelined requests over
//!   streaming their bodies to the handler to rendering the responses
//! - [`Transport`]: the byte stream underneath, with read/write deadlines and a one-shot push
//!   back of unread input

mod http_connection;
mod transport;

pub use http_connection::HttpConnection;
pub use transport::Transport;
