//! Shared fixtures for the transfer integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use ldata_remote::{
    CompletedPart, MockRemote, NodeResolver, RemoteHandle, RemoteNode, RemotePath, SignedUrls, UploadSession,
};
use ldata_transfer::error::{ErrorKind, Result};
use ldata_transfer::{Always, Download, ObjectTransport, Options, ProgressMode, TransferConfig, TransferContext};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const READ_SIZE: usize = 1024 * 1024;

/// Serves the signed URLs of a [`MockRemote`] straight from its store.
pub struct MockTransport {
    remote: Arc<MockRemote>,
    pub send_content_length: bool,
    pub send_etag: bool,
}

impl MockTransport {
    pub fn new(remote: Arc<MockRemote>) -> Self {
        Self {
            remote,
            send_content_length: true,
            send_etag: true,
        }
    }
}

fn not_found(url: &str) -> exn::Exn<ErrorKind> {
    exn::Exn::from(ErrorKind::Http {
        status: 404,
        url: url.to_string(),
    })
}

#[async_trait]
impl ObjectTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<Download> {
        let data = self.remote.fetch(url).await.ok_or_else(|| not_found(url))?;
        let content_length = self.send_content_length.then_some(data.len() as u64);
        let reads: Vec<Result<Bytes>> = data.chunks(READ_SIZE).map(|chunk| Ok(Bytes::copy_from_slice(chunk))).collect();
        Ok(Download {
            content_length,
            body: futures::stream::iter(reads).boxed(),
        })
    }

    async fn put(&self, url: &str, body: Bytes) -> Result<Option<String>> {
        let etag = self.remote.put(url, body.to_vec()).await.ok_or_else(|| not_found(url))?;
        Ok(self.send_etag.then_some(etag))
    }
}

/// A [`MockRemote`] whose recursive listing is replaced by fixed keys, which
/// may be anything a misbehaving control plane could send.
pub struct KeyedRemote {
    store: Arc<MockRemote>,
    keys: BTreeMap<String, String>,
}

impl KeyedRemote {
    pub fn new<'a>(store: Arc<MockRemote>, keys: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            store,
            keys: keys.into_iter().map(|(key, url)| (key.to_string(), url.to_string())).collect(),
        }
    }
}

#[async_trait]
impl NodeResolver for KeyedRemote {
    async fn resolve(&self, path: &RemotePath) -> ldata_remote::error::Result<RemoteNode> {
        self.store.resolve(path).await
    }

    async fn children(&self, path: &RemotePath) -> ldata_remote::error::Result<Vec<(String, RemoteNode)>> {
        self.store.children(path).await
    }
}

#[async_trait]
impl SignedUrls for KeyedRemote {
    async fn signed_url_for(&self, path: &RemotePath) -> ldata_remote::error::Result<String> {
        self.store.signed_url_for(path).await
    }

    async fn signed_urls_recursive(&self, _path: &RemotePath) -> ldata_remote::error::Result<BTreeMap<String, String>> {
        Ok(self.keys.clone())
    }

    async fn start_upload(
        &self,
        path: &RemotePath,
        part_count: usize,
        content_type: Option<&str>,
    ) -> ldata_remote::error::Result<UploadSession> {
        self.store.start_upload(path, part_count, content_type).await
    }

    async fn end_upload(
        &self,
        path: &RemotePath,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> ldata_remote::error::Result<()> {
        self.store.end_upload(path, upload_id, parts).await
    }
}

pub fn context(remote: RemoteHandle, transport: MockTransport) -> TransferContext {
    let config = TransferConfig {
        workers: 3,
        ..Default::default()
    };
    TransferContext::new(remote, Arc::new(transport))
        .with_config(config)
        .with_confirm(Arc::new(Always(false)))
        .with_refresh(Duration::from_millis(1))
}

pub fn quiet() -> Options {
    Options {
        progress: ProgressMode::None,
        ..Default::default()
    }
}

/// Per-file bars with a line for every file started and finished.
pub fn chatty() -> Options {
    Options {
        progress: ProgressMode::PerFile,
        verbose: true,
        ..Default::default()
    }
}

pub fn remote_path(s: &str) -> RemotePath {
    s.parse().unwrap()
}

/// Deterministic, non-repeating-looking payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
