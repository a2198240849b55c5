use http::StatusCode;
use rill_http::protocol::Method;
use thiserror::Error;

/// Per-request routing failures, handed to the router's error handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route matches the request path")]
    NotFound,

    #[error("method not allowed, allowed: {allow}")]
    MethodNotAllowed { allow: String },
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

/// Problems found while building a [`Router`](crate::router::Router).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterBuildError {
    #[error("invalid route template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: &'static str },

    #[error("route '{template}' names wildcard '{{{new}}}' where another route already uses '{{{existing}}}'")]
    MismatchingWildcards { template: String, existing: String, new: String },

    #[error("{method} {template} is registered more than once")]
    DuplicateRoute { method: Method, template: String },

    #[error("method {method} can't be routed")]
    UnroutableMethod { method: Method },
}
