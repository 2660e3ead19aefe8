//! Moving bytes to and from signed URLs.
//!
//! The control plane hands out pre-authenticated URLs; talking to them is a
//! separate concern with no credentials involved, so it sits behind its own
//! trait.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Body of a download, one network read per item.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// An open download.
pub struct Download {
    /// The response's `Content-Length`, if it sent one.
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

/// GET and PUT against signed object storage URLs.
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    /// Start a GET. Non-success statuses fail here, before any body is read.
    async fn get(&self, url: &str) -> Result<Download>;

    /// PUT `body` and return the `ETag` header of the response, if any.
    async fn put(&self, url: &str, body: Bytes) -> Result<Option<String>>;
}

pub type TransportHandle = Arc<dyn ObjectTransport>;

#[cfg(feature = "http")]
pub use self::http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::{Download, ObjectTransport};
    use crate::error::{ErrorKind, Result, redact};
    use async_trait::async_trait;
    use bytes::Bytes;
    use exn::ResultExt;
    use futures::StreamExt;
    use reqwest::header::{CONTENT_LENGTH, ETAG};
    use reqwest::{Client, Response};
    use std::time::Duration;

    /// Plain HTTP client for signed URLs. No authentication header is sent;
    /// the signature is in the URL.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        /// `timeout_secs` bounds connection setup and each read, not the
        /// whole transfer, so large objects are not cut off.
        pub fn new(timeout_secs: u64) -> Result<Self> {
            let timeout = Duration::from_secs(timeout_secs);
            let client = Client::builder()
                .connect_timeout(timeout)
                .read_timeout(timeout)
                .build()
                .or_raise(|| ErrorKind::Network("failed to build HTTP client".to_string()))?;
            Ok(Self { client })
        }

        fn check(response: Response, url: &str) -> Result<Response> {
            let status = response.status();
            if !status.is_success() {
                exn::bail!(ErrorKind::Http {
                    status: status.as_u16(),
                    url: redact(url).to_string(),
                });
            }
            Ok(response)
        }
    }

    #[async_trait]
    impl ObjectTransport for HttpTransport {
        async fn get(&self, url: &str) -> Result<Download> {
            let redacted = redact(url).to_string();
            let response = self
                .client
                .get(url)
                .send()
                .await
                .or_raise(|| ErrorKind::Network(redacted.clone()))?;
            let response = Self::check(response, url)?;
            let content_length = response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            let body = response
                .bytes_stream()
                .map(move |chunk| chunk.or_raise(|| ErrorKind::Network(redacted.clone())))
                .boxed();
            Ok(Download { content_length, body })
        }

        async fn put(&self, url: &str, body: Bytes) -> Result<Option<String>> {
            let response = self
                .client
                .put(url)
                .body(body)
                .send()
                .await
                .or_raise(|| ErrorKind::Network(redact(url).to_string()))?;
            let response = Self::check(response, url)?;
            Ok(response
                .headers()
                .get(ETAG)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string))
        }
    }
}
