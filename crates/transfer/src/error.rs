//! Transfer Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the control plane are
//! raised underneath [`ErrorKind::Exchange`] or [`ErrorKind::Resolve`], so the
//! remote status code and message stay reachable in the tree.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A transfer error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a transfer failure.
///
/// ### Planning Errors
/// Raised before a single byte moves:
/// - [`ErrorKind::InvalidDestination`]
/// - [`ErrorKind::InvalidSource`]
/// - [`ErrorKind::Resolve`]
/// - [`ErrorKind::Exchange`]
///
/// ### Job Errors
/// Any of these aborts the whole batch:
/// - [`ErrorKind::MissingContentLength`]
/// - [`ErrorKind::MissingEtag`]
/// - [`ErrorKind::Http`]
/// - [`ErrorKind::Network`]
/// - [`ErrorKind::Io`]
/// - [`ErrorKind::Progress`]
/// - [`ErrorKind::Worker`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The local destination cannot be written to as requested.
    #[display("invalid destination: {}", _0.display())]
    InvalidDestination(#[error(not(source))] PathBuf),
    /// The local upload source is missing or unreadable.
    #[display("invalid source: {}", _0.display())]
    InvalidSource(#[error(not(source))] PathBuf),
    /// Exchanging a path for signed URLs (or managing an upload session)
    /// failed.
    #[display("signed URL exchange failed")]
    Exchange,
    /// The remote path could not be resolved to a node.
    #[display("could not resolve remote path")]
    Resolve,
    /// A download response did not say how long it is.
    #[display("response for {_0} has no Content-Length")]
    MissingContentLength(#[error(not(source))] String),
    /// Object storage acknowledged a part without an ETag.
    #[display("upload of part {_0} returned no ETag")]
    MissingEtag(#[error(not(source))] usize),
    /// Object storage answered a signed URL with a non-success status.
    #[display("object storage returned {status} for {url}")]
    Http { status: u16, url: String },
    /// Object storage could not be reached, or the body was cut short.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// A local filesystem operation failed.
    #[display("I/O error at {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The progress manager stopped before the transfer did.
    #[display("progress reporting stopped unexpectedly")]
    Progress,
    /// A worker task panicked or was cancelled.
    #[display("transfer worker failed")]
    Worker,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Strip the query string (and with it the signature) from a signed URL so
/// it can be logged and shown in errors.
pub(crate) fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
