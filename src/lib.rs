//! Move data between local disk and Latch remote storage.
//!
//! [`Client`] wires the pieces together from a [`Config`]: the HTTP control
//! plane client, the signed-URL transport and the transfer engines. The
//! crates underneath stay usable on their own for callers that bring their
//! own [`Remote`] or [`ObjectTransport`].
//!
//! # Examples
//!
//! ```no_run
//! use ldata::{Client, logging};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! logging::init(1, logging::LogFormat::Text)?;
//! let client = Client::load(None)?;
//! let outcome = client
//!     .download(&"latch:///runs/42/".parse()?, Path::new("results"), client.options())
//!     .await?;
//! println!("{}", outcome.summary);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logging;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
pub use ldata_config::{ApiConfig, Config, ProgressConfig};
pub use ldata_remote::{HttpRemote, NodeType, Remote, RemoteHandle, RemoteNode, RemotePath};
pub use ldata_transfer::{
    Always, Confirm, HttpTransport, ObjectTransport, Options, ProgressMode, TerminalConfirm, TransferConfig,
    TransferContext, TransferOutcome, TransferSummary, TransportHandle,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entry point for transfers against one Latch deployment.
#[derive(Clone)]
pub struct Client {
    ctx: TransferContext,
    progress: ProgressMode,
}

impl Client {
    /// Load the configuration (see [`Config::load`]) and connect with it.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_file).or_raise(|| ErrorKind::Config)?;
        Self::from_config(&config)
    }

    /// Connect over HTTP. Requires an API token.
    pub fn from_config(config: &Config) -> Result<Self> {
        let Some(token) = &config.api.token else {
            exn::bail!(ErrorKind::Unauthenticated);
        };
        let remote = HttpRemote::new(&config.api.url, token, config.api.timeout_secs).or_raise(|| ErrorKind::Client)?;
        let transport = HttpTransport::new(config.api.timeout_secs).or_raise(|| ErrorKind::Client)?;
        Ok(Self::with_backends(Arc::new(remote), Arc::new(transport), config))
    }

    /// Use the given control plane and transport instead of HTTP.
    pub fn with_backends(remote: RemoteHandle, transport: TransportHandle, config: &Config) -> Self {
        let ctx = TransferContext::new(remote, transport)
            .with_config(config.transfer.clone())
            .with_refresh(config.progress.refresh());
        Self {
            ctx,
            progress: config.progress.mode,
        }
    }

    /// Replace how overwrite questions get answered (the terminal by default).
    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.ctx = self.ctx.with_confirm(confirm);
        self
    }

    pub fn context(&self) -> &TransferContext {
        &self.ctx
    }

    /// Per-call options with the configured progress mode.
    pub fn options(&self) -> Options {
        Options {
            progress: self.progress,
            ..Default::default()
        }
    }

    /// See [`ldata_transfer::download`].
    pub async fn download(
        &self,
        src: &RemotePath,
        dest: &Path,
        options: Options,
    ) -> ldata_transfer::error::Result<TransferOutcome<PathBuf>> {
        ldata_transfer::download(&self.ctx, src, dest, options).await
    }

    /// See [`ldata_transfer::upload`].
    pub async fn upload(
        &self,
        src: &Path,
        dest: &RemotePath,
        options: Options,
    ) -> ldata_transfer::error::Result<TransferOutcome<RemotePath>> {
        ldata_transfer::upload(&self.ctx, src, dest, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;
    use ldata_remote::MockRemote;
    use ldata_transfer::Download;
    use ldata_transfer::error::ErrorKind as TransferErrorKind;

    struct StoreTransport(Arc<MockRemote>);

    #[async_trait]
    impl ObjectTransport for StoreTransport {
        async fn get(&self, url: &str) -> ldata_transfer::error::Result<Download> {
            let Some(data) = self.0.fetch(url).await else {
                exn::bail!(TransferErrorKind::Http {
                    status: 404,
                    url: url.to_string()
                });
            };
            Ok(Download {
                content_length: Some(data.len() as u64),
                body: futures::stream::once(async move { Ok(Bytes::from(data)) }).boxed(),
            })
        }

        async fn put(&self, url: &str, body: Bytes) -> ldata_transfer::error::Result<Option<String>> {
            Ok(self.0.put(url, body.to_vec()).await)
        }
    }

    fn mock_client(remote: Arc<MockRemote>) -> Client {
        let mut config = Config::default();
        config.transfer.workers = 2;
        config.progress.mode = ProgressMode::None;
        config.progress.refresh_ms = 1;
        Client::with_backends(remote.clone(), Arc::new(StoreTransport(remote)), &config)
            .with_confirm(Arc::new(Always(false)))
    }

    #[test]
    fn test_from_config_requires_token() {
        let err = Client::from_config(&Config::default()).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Unauthenticated));
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = Config::default();
        config.api.token = Some("secret".to_string());
        config.progress.mode = ProgressMode::Total;
        config.transfer.workers = 6;
        let client = Client::from_config(&config).unwrap();
        assert_eq!(client.options().progress, ProgressMode::Total);
        assert!(!client.options().verbose);
        assert_eq!(client.context().config.workers, 6);
    }

    #[tokio::test]
    async fn test_upload_then_download_directory() {
        let remote = Arc::new(MockRemote::default());
        let client = mock_client(remote.clone());
        let temp_dir = tempfile::tempdir().unwrap();
        let src = temp_dir.path().join("batch");
        std::fs::create_dir_all(src.join("lane1")).unwrap();
        std::fs::write(src.join("lane1/r1.fq"), b"ACGT").unwrap();
        std::fs::write(src.join("lane1/r2.fq"), b"TGCA").unwrap();
        std::fs::write(src.join("samples.csv"), b"id\n1\n").unwrap();

        let uploaded = client
            .upload(&src, &"latch:///projects/batch".parse().unwrap(), client.options())
            .await
            .unwrap();
        assert_eq!(uploaded.summary.files, 3);
        assert_eq!(uploaded.summary.bytes, 13);
        assert_eq!(remote.content_type("projects/batch/samples.csv").await.as_deref(), Some("text/csv"));

        let out = temp_dir.path().join("copy");
        let downloaded = client
            .download(&"latch:///projects/batch".parse().unwrap(), &out, client.options())
            .await
            .unwrap();
        assert_eq!(downloaded.destination, out);
        assert_eq!(downloaded.summary.files, 3);
        assert_eq!(downloaded.progress.lines, 0);
        assert_eq!(std::fs::read(out.join("lane1/r2.fq")).unwrap(), b"TGCA");
        assert_eq!(std::fs::read(out.join("samples.csv")).unwrap(), b"id\n1\n");
    }
}
