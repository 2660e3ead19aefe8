//! Control-plane access for the Latch Data (`latch://`) filesystem.
//!
//! This crate knows how to name remote nodes ([`RemotePath`]), describe them
//! ([`RemoteNode`]), and ask the platform about them through two traits:
//! [`NodeResolver`] for metadata and [`SignedUrls`] for pre-authenticated
//! object storage URLs. Moving the bytes is left to `ldata-transfer`.
//!
//! # Implementations
//!
//! - [`HttpRemote`] (feature `http`): the real platform API.
//! - [`MockRemote`] (feature `mock`): in-memory tree for tests.

pub mod backend;
pub mod error;
mod node;
mod path;

#[cfg(feature = "http")]
pub use crate::backend::HttpRemote;
#[cfg(feature = "mock")]
pub use crate::backend::MockRemote;
#[cfg(feature = "mock")]
pub use crate::backend::mock::CommittedUpload;
pub use crate::backend::{CachedNode, CompletedPart, NodeResolver, Remote, SignedUrls, UploadSession};
pub use crate::node::{NodeType, RemoteNode};
pub use crate::path::{RemotePath, SCHEME, validate as validate_path};
use std::sync::Arc;

/// Shared handle to a control plane, cloned into every transfer worker.
pub type RemoteHandle = Arc<dyn Remote>;
