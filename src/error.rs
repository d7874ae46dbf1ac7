//! Error types.
//!
//! Three families, one per place they surface:
//!
//! - [`Error`]: infrastructure failures of [`Server`](crate::Server), such as
//!   binding a port or parsing its address.
//! - [`RouteError`]: a route rejected while the routing table is built.
//! - [`DispatchError`]: why a request did not end in a handler's response.
//!   Carried by [`Outcome`](crate::Outcome) and mapped to 404/405/500.

use thiserror::Error;

/// The failure signal a handler returns.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by the server's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    InvalidAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// A route that cannot be inserted into the trie.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A different parameter name already owns this trie position.
    #[error("parameter `:{requested}` conflicts with existing `:{existing}` at the same position")]
    ParamConflict { existing: String, requested: String },

    #[error("parameter segment `:` has no name")]
    EmptyParamName,

    #[error("`*` must be the last segment")]
    WildcardNotLast,
}

/// Why dispatch did not produce the handler's own response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("route not found")]
    RouteNotFound,

    /// The handler, or a middleware around it, returned an error.
    #[error("handler failed: {0}")]
    HandlerFailure(BoxError),

    /// The handler panicked. Caught by the dispatcher.
    #[error("handler panicked: {0}")]
    HandlerFault(String),
}

impl DispatchError {
    pub fn status(&self) -> http::StatusCode {
        match self {
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::RouteNotFound => http::StatusCode::NOT_FOUND,
            Self::HandlerFailure(_) | Self::HandlerFault(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
