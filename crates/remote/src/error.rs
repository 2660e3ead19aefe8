//! Remote Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A remote error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No node exists at the requested path.
    #[display("no such remote node: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The caller's credentials do not grant access to the path.
    #[display("not authorized to access {_0}")]
    Unauthorized(#[error(not(source))] String),
    /// Children were requested from a node that cannot have any.
    #[display("not a directory: {_0}")]
    NotADirectory(#[error(not(source))] String),
    /// Path is not a well-formed `latch://` path, or escapes its root.
    #[display("invalid remote path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// The control plane answered with a non-200 status.
    #[display("remote API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// Could not reach the control plane at all.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The control plane answered 200 but the body was not what we expected.
    #[display("invalid response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn error_kind_display() {
        let err = ErrorKind::Api {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert_eq!(err.to_string(), "remote API error (403): forbidden");
        assert_eq!(ErrorKind::NotFound("latch:///a".to_string()).to_string(), "no such remote node: latch:///a");
    }

    #[rstest]
    #[case(ErrorKind::Network("reset".to_string()), true)]
    #[case(ErrorKind::Api { status: 503, message: String::new() }, true)]
    #[case(ErrorKind::Api { status: 429, message: String::new() }, true)]
    #[case(ErrorKind::Api { status: 400, message: String::new() }, false)]
    #[case(ErrorKind::NotFound(String::new()), false)]
    fn error_kind_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }
}
