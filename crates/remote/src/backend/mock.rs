//! In-memory control plane for testing.

use crate::error::{ErrorKind, Result};
use crate::node::RemoteNode;
use crate::path::{RemotePath, validate as validate_path};
use crate::{CompletedPart, NodeResolver, SignedUrls, UploadSession};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const OBJECT_PREFIX: &str = "mock://object/";
const PUT_PREFIX: &str = "mock://put/";
const PART_PREFIX: &str = "mock://part/";

/// A finished multipart commit, as seen by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedUpload {
    pub path: PathBuf,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<PathBuf, Vec<u8>>,
    /// upload id → (destination, received parts by part number)
    uploads: HashMap<String, (PathBuf, BTreeMap<usize, Vec<u8>>)>,
    committed: Vec<CommittedUpload>,
    failures: HashMap<PathBuf, (u16, String)>,
    content_types: HashMap<PathBuf, String>,
    next_upload: usize,
}

/// In-memory control plane and object store for testing.
///
/// Objects live in a [`BTreeMap`] behind a [`RwLock`]; directories are
/// implied by object paths. Signed URLs point back into the same store
/// (`mock://object/<path>` for downloads, `mock://put/...` and
/// `mock://part/...` for uploads), so a test transport can serve them with
/// [`MockRemote::fetch`] and [`MockRemote::put`].
///
/// # Examples
///
/// ```
/// use ldata_remote::{MockRemote, NodeResolver, SignedUrls};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let remote = MockRemote::with_files([("runs/a.txt", b"hello")]);
/// let node = remote.resolve(&"latch:///runs".parse()?).await?;
/// assert!(node.can_have_children());
/// let urls = remote.signed_urls_recursive(&"latch:///runs".parse()?).await?;
/// assert_eq!(remote.fetch(&urls["a.txt"]).await, Some(b"hello".to_vec()));
/// # Ok(())
/// # }
/// ```
pub struct MockRemote {
    state: RwLock<State>,
}

impl MockRemote {
    /// Create a mock remote pre-populated with objects.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut objects = BTreeMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockRemote::with_files: invalid path {}", path.display());
            };
            objects.insert(validated, data.into());
        }
        Self {
            state: RwLock::new(State { objects, ..Default::default() }),
        }
    }

    /// Make every signed-URL request for `path` fail with the given status.
    pub fn with_failure(mut self, path: impl Into<PathBuf>, status: u16, message: impl Into<String>) -> Self {
        self.state.get_mut().failures.insert(path.into(), (status, message.into()));
        self
    }

    /// Current contents of an object.
    pub async fn object(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state.read().await.objects.get(path.as_ref()).cloned()
    }

    /// Multipart uploads committed so far, in commit order.
    pub async fn committed(&self) -> Vec<CommittedUpload> {
        self.state.read().await.committed.clone()
    }

    /// Content type declared when the upload of `path` was started.
    pub async fn content_type(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state.read().await.content_types.get(path.as_ref()).cloned()
    }

    /// Serve a signed GET URL.
    pub async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let path = url.strip_prefix(OBJECT_PREFIX)?;
        self.object(path).await
    }

    /// Accept a signed PUT. Returns the ETag object storage would report.
    pub async fn put(&self, url: &str, data: Vec<u8>) -> Option<String> {
        let etag = format!("\"{:016x}\"", fingerprint(&data));
        let mut state = self.state.write().await;
        if let Some(path) = url.strip_prefix(PUT_PREFIX) {
            state.objects.insert(PathBuf::from(path), data);
            return Some(etag);
        }
        let (upload_id, part) = url.strip_prefix(PART_PREFIX)?.split_once('/')?;
        let part: usize = part.parse().ok()?;
        let (_, parts) = state.uploads.get_mut(upload_id)?;
        parts.insert(part, data);
        Some(etag)
    }

    fn key(path: &RemotePath) -> PathBuf {
        path.path().to_path_buf()
    }

    fn check_failure(state: &State, path: &RemotePath) -> Result<()> {
        if let Some((status, message)) = state.failures.get(&Self::key(path)) {
            exn::bail!(ErrorKind::Api {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(())
    }

    fn node_for(state: &State, path: &RemotePath) -> Option<RemoteNode> {
        let key = Self::key(path);
        if key.as_os_str().is_empty() {
            let mut root = RemoteNode::directory("root", path.domain());
            root.node_type = crate::NodeType::AccountRoot;
            return Some(root);
        }
        if let Some(data) = state.objects.get(&key) {
            return Some(RemoteNode::object(key.display().to_string(), path.name(), data.len() as u64));
        }
        state
            .objects
            .keys()
            .any(|p| p.starts_with(&key))
            .then(|| RemoteNode::directory(key.display().to_string(), path.name()))
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

fn fingerprint(data: &[u8]) -> u64 {
    // FNV-1a, enough to tell parts apart in assertions.
    data.iter().fold(0xcbf29ce484222325, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(0x100000001b3))
}

#[async_trait]
impl NodeResolver for MockRemote {
    async fn resolve(&self, path: &RemotePath) -> Result<RemoteNode> {
        let state = self.state.read().await;
        Self::node_for(&state, path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.to_string())))
    }

    async fn children(&self, path: &RemotePath) -> Result<Vec<(String, RemoteNode)>> {
        let state = self.state.read().await;
        let node = Self::node_for(&state, path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.to_string())))?;
        if !node.can_have_children() {
            exn::bail!(ErrorKind::NotADirectory(path.to_string()));
        }
        let key = Self::key(path);
        let mut names: Vec<String> = state
            .objects
            .keys()
            .filter_map(|p| p.strip_prefix(&key).ok())
            .filter_map(|rel| rel.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        names.dedup();
        names
            .into_iter()
            .map(|name| {
                let child = path.join(&name)?;
                let node = Self::node_for(&state, &child)
                    .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(child.to_string())))?;
                Ok((name, node))
            })
            .collect()
    }
}

#[async_trait]
impl SignedUrls for MockRemote {
    async fn signed_url_for(&self, path: &RemotePath) -> Result<String> {
        let state = self.state.read().await;
        Self::check_failure(&state, path)?;
        let key = Self::key(path);
        match state.objects.contains_key(&key) {
            true => Ok(format!("{OBJECT_PREFIX}{}", key.display())),
            false => exn::bail!(ErrorKind::Api {
                status: 404,
                message: format!("object not found: {path}"),
            }),
        }
    }

    async fn signed_urls_recursive(&self, path: &RemotePath) -> Result<BTreeMap<String, String>> {
        let state = self.state.read().await;
        Self::check_failure(&state, path)?;
        let key = Self::key(path);
        Ok(state
            .objects
            .keys()
            .filter_map(|p| {
                let rel = p.strip_prefix(&key).ok()?;
                (!rel.as_os_str().is_empty())
                    .then(|| (rel.display().to_string(), format!("{OBJECT_PREFIX}{}", p.display())))
            })
            .collect())
    }

    async fn start_upload(
        &self,
        path: &RemotePath,
        part_count: usize,
        content_type: Option<&str>,
    ) -> Result<UploadSession> {
        let mut state = self.state.write().await;
        Self::check_failure(&state, path)?;
        let key = Self::key(path);
        if let Some(content_type) = content_type {
            state.content_types.insert(key.clone(), content_type.to_string());
        }
        if part_count <= 1 {
            return Ok(UploadSession {
                upload_id: None,
                urls: vec![format!("{PUT_PREFIX}{}", key.display())],
            });
        }
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(upload_id.clone(), (key, BTreeMap::new()));
        Ok(UploadSession {
            urls: (1..=part_count).map(|n| format!("{PART_PREFIX}{upload_id}/{n}")).collect(),
            upload_id: Some(upload_id),
        })
    }

    async fn end_upload(&self, path: &RemotePath, upload_id: &str, parts: &[CompletedPart]) -> Result<()> {
        let mut state = self.state.write().await;
        let bad_request = |message: &str| ErrorKind::Api {
            status: 400,
            message: message.to_string(),
        };
        let (key, received) = state.uploads.remove(upload_id).ok_or_else(|| exn::Exn::from(bad_request("unknown upload")))?;
        if key != Self::key(path) {
            exn::bail!(bad_request("upload path mismatch"));
        }
        let mut assembled = Vec::new();
        for part in parts {
            let data = received.get(&part.part_number).ok_or_else(|| exn::Exn::from(bad_request("missing part")))?;
            if part.etag != format!("\"{:016x}\"", fingerprint(data)) {
                exn::bail!(bad_request("etag mismatch"));
            }
            assembled.extend_from_slice(data);
        }
        state.objects.insert(key.clone(), assembled);
        state.committed.push(CommittedUpload {
            path: key,
            upload_id: upload_id.to_string(),
            parts: parts.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RemotePath {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_resolve_kinds() {
        let remote = MockRemote::with_files([("a/b/c.txt", b"abc".to_vec())]);
        assert_eq!(remote.resolve(&p("latch:///")).await.unwrap().node_type, crate::NodeType::AccountRoot);
        assert!(remote.resolve(&p("latch:///a/b")).await.unwrap().can_have_children());
        assert_eq!(remote.resolve(&p("latch:///a/b/c.txt")).await.unwrap().size, Some(3));
        let err = remote.resolve(&p("latch:///nope")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_children() {
        let remote = MockRemote::with_files([("a/x.txt", b"1".to_vec()), ("a/y/z.txt", b"2".to_vec())]);
        let children = remote.children(&p("latch:///a")).await.unwrap();
        let names: Vec<_> = children.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["x.txt", "y"]);
        assert!(remote.children(&p("latch:///a/x.txt")).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let remote = MockRemote::with_files([("a.txt", b"1".to_vec())]).with_failure("a.txt", 500, "boom");
        let err = remote.signed_url_for(&p("latch:///a.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_multipart_round_trip() {
        let remote = MockRemote::default();
        let target = p("latch:///up/file.bin");
        let session = remote.start_upload(&target, 2, None).await.unwrap();
        let upload_id = session.upload_id.clone().unwrap();
        let mut parts = Vec::new();
        for (i, (url, data)) in session.urls.iter().zip([b"ab".to_vec(), b"cd".to_vec()]).enumerate() {
            let etag = remote.put(url, data).await.unwrap();
            parts.push(CompletedPart { etag, part_number: i + 1 });
        }
        remote.end_upload(&target, &upload_id, &parts).await.unwrap();
        assert_eq!(remote.object("up/file.bin").await.unwrap(), b"abcd");
        assert_eq!(remote.committed().await.len(), 1);
    }

    #[tokio::test]
    async fn test_start_upload_records_content_type() {
        let remote = MockRemote::default();
        remote.start_upload(&p("latch:///t/table.csv"), 1, Some("text/csv")).await.unwrap();
        remote.start_upload(&p("latch:///t/blob"), 1, None).await.unwrap();
        assert_eq!(remote.content_type("t/table.csv").await.as_deref(), Some("text/csv"));
        assert_eq!(remote.content_type("t/blob").await, None);
    }
}
