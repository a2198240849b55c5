//! Core HTTP protocol types.
//!
//! This module provides the building blocks shared by the parser, the connection loop and
//! request handlers.
//!
//! - **Requests and responses** ([`Request`], [`Response`]): the request is owned by one
//!   connection and reused across pipelined requests; the response carries a constant body.
//! - **Header/parameter store** ([`Headers`], [`Params`]): ordered, case-insensitive, linear
//!   scan lookups.
//! - **Request line vocabulary** ([`Method`], [`Protocol`]).
//! - **Payload framing** ([`PayloadItem`], [`PayloadSize`]).
//! - **Body streaming** ([`body`]): the gateway between the body decoder and the handler.
//! - **Errors** ([`HttpError`], [`ParseError`], [`SendError`]).

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod headers;
pub use headers::Headers;
pub use headers::Params;

mod method;
pub use method::Method;

mod version;
pub use version::Protocol;

mod request;
pub use request::ConnectionOption;
pub use request::Query;
pub use request::Request;

mod response;
pub use response::Response;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
