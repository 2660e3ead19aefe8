//! HTTP control-plane client.
//!
//! Signed-URL exchange and upload session management are plain JSON POST
//! endpoints under `/ldata/`. Node resolution goes through the platform's
//! GraphQL endpoint with two fixed documents.

use crate::error::{ErrorKind, Result};
use crate::node::RemoteNode;
use crate::path::RemotePath;
use crate::{CompletedPart, NodeResolver, SignedUrls, UploadSession};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

const RESOLVE_QUERY: &str = r#"
query ResolvePath($path: String!) {
    node: ldataResolvePathData(argPath: $path) { id name type size contentType }
}"#;

const CHILDREN_QUERY: &str = r#"
query ChildNodes($path: String!) {
    node: ldataResolvePathData(argPath: $path) {
        type
        children: childLdataTreeEdges { nodes { child { id name type size contentType } } }
    }
}"#;

/// Response envelope of the `/ldata/*` endpoints.
#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

#[derive(Deserialize)]
struct SignedUrlMap {
    urls: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct NodeQuery {
    node: Option<GqlNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlNode {
    id: String,
    name: String,
    #[serde(rename = "type")]
    node_type: crate::NodeType,
    // BigInt scalars arrive as strings.
    size: Option<String>,
    content_type: Option<String>,
}

#[derive(Deserialize)]
struct ChildrenQuery {
    node: Option<GqlParent>,
}

#[derive(Deserialize)]
struct GqlParent {
    #[serde(rename = "type")]
    node_type: crate::NodeType,
    children: GqlEdges,
}

#[derive(Deserialize)]
struct GqlEdges {
    nodes: Vec<GqlEdge>,
}

#[derive(Deserialize)]
struct GqlEdge {
    child: GqlNode,
}

impl TryFrom<GqlNode> for RemoteNode {
    type Error = crate::error::Error;
    fn try_from(node: GqlNode) -> Result<Self> {
        let size = node
            .size
            .map(|s| s.parse::<u64>().or_raise(|| ErrorKind::InvalidResponse(format!("node size `{s}`"))))
            .transpose()?;
        Ok(RemoteNode {
            id: node.id,
            name: node.name,
            node_type: node.node_type,
            size,
            content_type: node.content_type,
        })
    }
}

/// Control-plane client authenticated with a bearer token.
///
/// # Examples
///
/// ```no_run
/// use ldata_remote::{HttpRemote, SignedUrls};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let remote = HttpRemote::new("https://nucleus.latch.bio", "token", 30)?;
/// let url = remote.signed_url_for(&"latch:///welcome/data.csv".parse()?).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    api: String,
    token: String,
}

impl HttpRemote {
    pub fn new(api: impl Into<String>, token: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .or_raise(|| ErrorKind::Network("failed to build HTTP client".to_string()))?;
        Ok(Self {
            client,
            api: api.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<(u16, String)> {
        let url = format!("{}{endpoint}", self.api);
        tracing::debug!(url = %url, "control plane request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(url.clone()))?;
        let status = response.status().as_u16();
        let text = response.text().await.or_raise(|| ErrorKind::Network(url))?;
        Ok((status, text))
    }

    async fn ldata<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T> {
        let (status, text) = self.post_json(endpoint, &body).await?;
        parse_envelope(status, &text)
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, path: &RemotePath) -> Result<T> {
        let body = json!({ "query": query, "variables": { "path": path.to_string() } });
        let (status, text) = self.post_json("/graphql", &body).await?;
        parse_graphql(status, &text, path)
    }
}

/// Decode an `/ldata/*` response, surfacing the server's `{"error": ...}`
/// message on non-200 statuses.
fn parse_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    if status != StatusCode::OK.as_u16() {
        exn::bail!(ErrorKind::Api {
            status,
            message: error_message(body),
        });
    }
    let envelope: Envelope<T> =
        serde_json::from_str(body).or_raise(|| ErrorKind::InvalidResponse(truncate(body).to_string()))?;
    Ok(envelope.data)
}

fn parse_graphql<T: DeserializeOwned>(status: u16, body: &str, path: &RemotePath) -> Result<T> {
    match status {
        401 | 403 => exn::bail!(ErrorKind::Unauthorized(path.to_string())),
        200 => {},
        _ => exn::bail!(ErrorKind::Api {
            status,
            message: error_message(body),
        }),
    }
    let response: GraphqlResponse<T> =
        serde_json::from_str(body).or_raise(|| ErrorKind::InvalidResponse(truncate(body).to_string()))?;
    if let Some(first) = response.errors.first() {
        if first.message.to_ascii_lowercase().contains("permission") {
            exn::bail!(ErrorKind::Unauthorized(path.to_string()));
        }
        exn::bail!(ErrorKind::Api {
            status,
            message: first.message.clone(),
        });
    }
    response.data.ok_or_else(|| ErrorKind::InvalidResponse("missing `data`".to_string()).into())
}

fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => e.error,
        Err(_) => truncate(body).to_string(),
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl NodeResolver for HttpRemote {
    async fn resolve(&self, path: &RemotePath) -> Result<RemoteNode> {
        let query: NodeQuery = self.graphql(RESOLVE_QUERY, path).await?;
        let node = query.node.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.to_string())))?;
        node.try_into()
    }

    async fn children(&self, path: &RemotePath) -> Result<Vec<(String, RemoteNode)>> {
        let query: ChildrenQuery = self.graphql(CHILDREN_QUERY, path).await?;
        let parent = query.node.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.to_string())))?;
        if !parent.node_type.can_have_children() {
            exn::bail!(ErrorKind::NotADirectory(path.to_string()));
        }
        parent
            .children
            .nodes
            .into_iter()
            .map(|edge| {
                let node = RemoteNode::try_from(edge.child)?;
                Ok((node.name.clone(), node))
            })
            .collect()
    }
}

#[async_trait]
impl SignedUrls for HttpRemote {
    async fn signed_url_for(&self, path: &RemotePath) -> Result<String> {
        let data: SignedUrl = self.ldata("/ldata/get-signed-url", json!({ "path": path.to_string() })).await?;
        Ok(data.url)
    }

    async fn signed_urls_recursive(&self, path: &RemotePath) -> Result<BTreeMap<String, String>> {
        let data: SignedUrlMap =
            self.ldata("/ldata/get-signed-urls-recursive", json!({ "path": path.to_string() })).await?;
        Ok(data.urls)
    }

    async fn start_upload(
        &self,
        path: &RemotePath,
        part_count: usize,
        content_type: Option<&str>,
    ) -> Result<UploadSession> {
        let body = json!({
            "path": path.to_string(),
            "part_count": part_count,
            "content_type": content_type,
        });
        let session: UploadSession = self.ldata("/ldata/start-upload", body).await?;
        if session.urls.len() != part_count {
            exn::bail!(ErrorKind::InvalidResponse(format!(
                "requested {part_count} upload URLs, received {}",
                session.urls.len()
            )));
        }
        Ok(session)
    }

    async fn end_upload(&self, path: &RemotePath, upload_id: &str, parts: &[CompletedPart]) -> Result<()> {
        let body = json!({
            "path": path.to_string(),
            "upload_id": upload_id,
            "parts": parts,
        });
        let _: Value = self.ldata("/ldata/end-upload", body).await?;
        Ok(())
    }
}
