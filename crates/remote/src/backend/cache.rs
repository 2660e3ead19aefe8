use crate::error::Result;
use crate::node::RemoteNode;
use crate::path::RemotePath;
use crate::NodeResolver;
use tokio::sync::OnceCell;

/// A remote path paired with its lazily resolved node.
///
/// The node is fetched on first access and kept for as long as the path
/// stays the same. Changing the path (e.g. after a rename) drops the cached
/// node; there is no time-based expiry.
#[derive(Debug)]
pub struct CachedNode {
    path: RemotePath,
    node: OnceCell<RemoteNode>,
}

impl CachedNode {
    pub fn new(path: RemotePath) -> Self {
        Self { path, node: OnceCell::new() }
    }

    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    /// Point this handle somewhere else, invalidating the cached node if the
    /// path string actually changed.
    pub fn set_path(&mut self, path: RemotePath) {
        if path.to_string() != self.path.to_string() {
            self.node = OnceCell::new();
        }
        self.path = path;
    }

    /// Resolve (at most once per path) and return the node.
    pub async fn node(&self, resolver: &dyn NodeResolver) -> Result<&RemoteNode> {
        self.node.get_or_try_init(|| resolver.resolve(&self.path)).await
    }

    /// The cached node, if it has been resolved already.
    pub fn cached(&self) -> Option<&RemoteNode> {
        self.node.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NodeResolver for CountingResolver {
        async fn resolve(&self, path: &RemotePath) -> Result<RemoteNode> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.name() == "missing" {
                exn::bail!(ErrorKind::NotFound(path.to_string()));
            }
            Ok(RemoteNode::object("1", path.name(), 3))
        }

        async fn children(&self, path: &RemotePath) -> Result<Vec<(String, RemoteNode)>> {
            exn::bail!(ErrorKind::NotADirectory(path.to_string()))
        }
    }

    #[tokio::test]
    async fn test_resolves_once_per_path() {
        let resolver = CountingResolver::default();
        let cached = CachedNode::new("latch:///a.txt".parse().unwrap());
        assert!(cached.cached().is_none());
        assert_eq!(cached.node(&resolver).await.unwrap().name, "a.txt");
        assert_eq!(cached.node(&resolver).await.unwrap().name, "a.txt");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_path_change_invalidates() {
        let resolver = CountingResolver::default();
        let mut cached = CachedNode::new("latch:///a.txt".parse().unwrap());
        cached.node(&resolver).await.unwrap();
        // Same path string: cache survives.
        cached.set_path("latch:///a.txt".parse().unwrap());
        assert!(cached.cached().is_some());
        // Renamed: cache dropped and re-fetched.
        cached.set_path("latch:///b.txt".parse().unwrap());
        assert!(cached.cached().is_none());
        assert_eq!(cached.node(&resolver).await.unwrap().name, "b.txt");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_resolution_is_not_cached() {
        let resolver = CountingResolver::default();
        let cached = CachedNode::new("latch:///missing".parse().unwrap());
        let err = cached.node(&resolver).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(cached.node(&resolver).await.is_err());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }
}
