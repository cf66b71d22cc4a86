//! # Error Taxonomy
//!
//! Every way a request can fail inside the dispatch engine is a [`WebError`]. The variants split
//! into two families:
//!
//! - **Protocol errors** carry a status code ([`WebError::status`] returns `Some`). The pipeline
//!   answers them with a minimal HTML body and, unless [`WebError::closes_connection`] says
//!   otherwise, keeps serving the connection.
//! - **Fatal errors** come from inside a dispatched handler (action, endpoint, transform) or from
//!   the socket itself. They are logged with full context and the connection is dropped without a
//!   response; clients read "connection closed" as "handler failed".
//!
//! [`WebError::status`] is `None` exactly for the fatal family.

use http::{Method, StatusCode};
use thiserror::Error;

/// Failure while serving a single request.
#[derive(Debug, Error)]
pub enum WebError {
    /// A `..` segment tried to climb above the service root.
    #[error("path escapes the service root")]
    PathEscapesRoot,

    /// Percent-decoding produced bytes that are not UTF-8.
    #[error("request path is not valid percent-encoded UTF-8")]
    InvalidPathEncoding,

    /// No route matched the normalized path.
    #[error("no route matches {path}")]
    RouteNotFound { path: String },

    /// The request line exceeded the configured maximum.
    #[error("request line longer than {limit} bytes")]
    RequestLineTooLong { limit: usize },

    /// A header line was too long or there were too many headers.
    #[error("request header section exceeds configured limits")]
    HeadersTooLarge,

    /// The request line or a header line could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The request named an HTTP version other than 1.x.
    #[error("HTTP version {0} not supported")]
    VersionNotSupported(String),

    /// The declared body length exceeds the configured maximum.
    #[error("request body of {length} bytes exceeds limit of {limit}")]
    BodyTooLarge { length: usize, limit: usize },

    /// The body was not the JSON document the target expects.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// The resolved content does not answer this method.
    #[error("unsupported method ({method})")]
    UnsupportedMethod { method: Method },

    /// A POST named an action the object never registered.
    #[error("object `{object}` has no action `{action}`")]
    ActionNotFound { object: String, action: String },

    /// An endpoint received a different number of captures than it declared.
    #[error("endpoint expects {expected} captures, route supplied {actual}")]
    CaptureArity { expected: usize, actual: usize },

    /// An external transform failed to produce content.
    #[error("transform `{id}` failed on {source_path}: {error:#}")]
    TransformFailed {
        id: String,
        source_path: String,
        error: anyhow::Error,
    },

    /// Any other failure raised from inside a handler callback.
    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),

    /// Reading from or writing to the connection failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WebError {
    /// Status code to answer with, or `None` for errors that drop the connection unanswered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            WebError::PathEscapesRoot | WebError::InvalidPathEncoding => {
                Some(StatusCode::BAD_REQUEST)
            }
            WebError::RouteNotFound { .. } => Some(StatusCode::NOT_FOUND),
            WebError::RequestLineTooLong { .. } => Some(StatusCode::URI_TOO_LONG),
            WebError::HeadersTooLarge => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            WebError::MalformedRequest(_) => Some(StatusCode::BAD_REQUEST),
            WebError::VersionNotSupported(_) => Some(StatusCode::HTTP_VERSION_NOT_SUPPORTED),
            WebError::BodyTooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            WebError::MalformedBody(_) => Some(StatusCode::BAD_REQUEST),
            WebError::UnsupportedMethod { .. } => Some(StatusCode::NOT_IMPLEMENTED),
            WebError::ActionNotFound { .. }
            | WebError::CaptureArity { .. }
            | WebError::TransformFailed { .. }
            | WebError::Handler(_)
            | WebError::Io(_) => None,
        }
    }

    /// Whether the connection must be closed after this error.
    ///
    /// Framing errors leave the byte stream in an unknown state, so nothing after them can be
    /// trusted as the start of a new request.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        match self {
            WebError::RequestLineTooLong { .. }
            | WebError::HeadersTooLarge
            | WebError::MalformedRequest(_)
            | WebError::VersionNotSupported(_)
            | WebError::BodyTooLarge { .. } => true,
            other => other.status().is_none(),
        }
    }

    pub(crate) fn unsupported(method: &Method) -> Self {
        WebError::UnsupportedMethod {
            method: method.clone(),
        }
    }
}

/// Failure while building a [`RouteTable`](crate::router::RouteTable).
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("route `{route}` supplies {groups} captures but its endpoint expects {arity}")]
    ArityMismatch {
        route: String,
        groups: usize,
        arity: usize,
    },
}

/// Failure while touching a field of a [`StatefulObject`](crate::object::StatefulObject).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("object `{object}` has no field `{field}`")]
    UnknownField { object: String, field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_have_status() {
        assert_eq!(
            WebError::RequestLineTooLong { limit: 2048 }.status(),
            Some(StatusCode::URI_TOO_LONG)
        );
        assert_eq!(
            WebError::MalformedBody("eof".into()).status(),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(
            WebError::unsupported(&Method::DELETE).status(),
            Some(StatusCode::NOT_IMPLEMENTED)
        );
    }

    #[test]
    fn test_fatal_errors_close_without_status() {
        let err = WebError::ActionNotFound {
            object: "flub".into(),
            action: "explode".into(),
        };
        assert!(err.status().is_none());
        assert!(err.closes_connection());
        assert!(WebError::Handler(anyhow::anyhow!("boom")).closes_connection());
    }

    #[test]
    fn test_not_found_keeps_connection() {
        let err = WebError::RouteNotFound { path: "/x".into() };
        assert!(!err.closes_connection());
        assert!(WebError::RequestLineTooLong { limit: 1 }.closes_connection());
    }
}
