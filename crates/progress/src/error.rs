//! Progress Error Types

use derive_more::{Display, Error};

/// A progress error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for progress operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The manager task has shut down (closed, or its runtime went away).
    #[display("progress manager is no longer running")]
    Closed,
}
