//! SDK Error Types
//!
//! Setting up a [`Client`](crate::Client) fails with these; transfers
//! themselves report [`ldata_transfer::error::ErrorKind`].

use derive_more::{Display, Error};

/// A client setup error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for client setup.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration could not be loaded or failed validation.
    #[display("configuration error")]
    Config,
    /// No API token in the config, `LATCH_TOKEN` or `~/.latch/token`.
    #[display("no API token found; set LDATA_API__TOKEN or log in with latch")]
    Unauthenticated,
    /// An HTTP client could not be built.
    #[display("could not set up HTTP client")]
    Client,
    /// A global tracing subscriber is already installed.
    #[display("could not install log subscriber")]
    Logging,
}
