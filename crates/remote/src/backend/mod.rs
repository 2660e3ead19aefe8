//! Control-plane traits and implementations.
//!
//! The transfer engine only ever talks to the platform through two narrow
//! seams: [`NodeResolver`] (what is at this path?) and [`SignedUrls`] (give me
//! pre-authenticated URLs for the bytes). Both are object-safe so they can be
//! shared as a [`RemoteHandle`] between concurrent workers.

mod cache;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "mock")]
pub mod mock;

pub use self::cache::CachedNode;
#[cfg(feature = "http")]
pub use self::http::HttpRemote;
#[cfg(feature = "mock")]
pub use self::mock::MockRemote;
use crate::error::Result;
use crate::node::RemoteNode;
use crate::path::RemotePath;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolves remote paths to node metadata.
///
/// # Examples
///
/// ```
/// use ldata_remote::{NodeResolver, RemotePath, error::Result};
///
/// async fn size_of(resolver: &dyn NodeResolver, path: &RemotePath) -> Result<u64> {
///     let node = resolver.resolve(path).await?;
///     Ok(node.size.unwrap_or(0))
/// }
/// ```
#[async_trait]
pub trait NodeResolver: Send + Sync {
    /// Look up the node at `path`.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if nothing
    /// exists there and [`Unauthorized`](crate::error::ErrorKind::Unauthorized)
    /// if the caller lacks access.
    async fn resolve(&self, path: &RemotePath) -> Result<RemoteNode>;

    /// Immediate children of the node at `path`, keyed by their name relative
    /// to it.
    ///
    /// Only valid for nodes that [can have children](crate::NodeType::can_have_children);
    /// anything else returns [`NotADirectory`](crate::error::ErrorKind::NotADirectory).
    /// Each call is a fresh round trip, so the sequence can be re-fetched at
    /// will.
    async fn children(&self, path: &RemotePath) -> Result<Vec<(String, RemoteNode)>>;
}

/// Exchanges node paths for time-limited, pre-authenticated URLs.
#[async_trait]
pub trait SignedUrls: Send + Sync {
    /// Signed GET URL for a single object.
    async fn signed_url_for(&self, path: &RemotePath) -> Result<String>;

    /// Signed GET URLs for every object below `path`.
    ///
    /// Keys are always relative to `path`, so callers can rebuild the layout
    /// of the subtree without walking it.
    async fn signed_urls_recursive(&self, path: &RemotePath) -> Result<BTreeMap<String, String>>;

    /// Begin an upload of `part_count` parts to `path`.
    async fn start_upload(
        &self,
        path: &RemotePath,
        part_count: usize,
        content_type: Option<&str>,
    ) -> Result<UploadSession>;

    /// Commit a multipart upload. `parts` must be ordered by part number.
    async fn end_upload(&self, path: &RemotePath, upload_id: &str, parts: &[CompletedPart]) -> Result<()>;
}

/// Everything the transfer engine needs from the control plane.
pub trait Remote: NodeResolver + SignedUrls {}
impl<T: NodeResolver + SignedUrls + ?Sized> Remote for T {}

/// Pre-signed upload targets handed out by [`SignedUrls::start_upload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Present for multipart uploads, which must be committed with
    /// [`SignedUrls::end_upload`]. Absent when a single PUT is enough.
    #[serde(default)]
    pub upload_id: Option<String>,
    /// One URL per part, in part order.
    pub urls: Vec<String>,
}

impl UploadSession {
    pub fn is_multipart(&self) -> bool {
        self.upload_id.is_some()
    }
}

/// A part that has been uploaded and acknowledged by object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "PartNumber")]
    pub part_number: usize,
}
