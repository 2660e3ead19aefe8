//! Remote filesystem models.

use serde::{Deserialize, Serialize};

/// Kind of entry in the remote filesystem graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "OBJ")]
    Object,
    #[serde(rename = "DIR")]
    Directory,
    #[serde(rename = "MOUNT")]
    Mount,
    #[serde(rename = "ACCOUNT_ROOT")]
    AccountRoot,
    #[serde(rename = "LINK")]
    Symlink,
}

impl NodeType {
    /// Only directories, account roots and mounts can contain other nodes.
    pub fn can_have_children(&self) -> bool {
        matches!(self, Self::Directory | Self::AccountRoot | Self::Mount)
    }
}

/// One entry in the remote filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Opaque handle assigned by the control plane.
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Size in bytes, only reported for objects.
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl RemoteNode {
    pub fn object(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: NodeType::Object,
            size: Some(size),
            content_type: None,
        }
    }

    pub fn directory(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: NodeType::Directory,
            size: None,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn can_have_children(&self) -> bool {
        self.node_type.can_have_children()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(NodeType::Object, false)]
    #[case(NodeType::Directory, true)]
    #[case(NodeType::Mount, true)]
    #[case(NodeType::AccountRoot, true)]
    #[case(NodeType::Symlink, false)]
    fn test_can_have_children(#[case] node_type: NodeType, #[case] expected: bool) {
        assert_eq!(node_type.can_have_children(), expected);
    }

    #[test]
    fn test_deserialize_node() {
        let node: RemoteNode = serde_json::from_str(
            r#"{"id": "4107", "name": "reads.fastq", "type": "OBJ", "size": 12, "content_type": "text/plain"}"#,
        )
        .unwrap();
        assert_eq!(node.node_type, NodeType::Object);
        assert_eq!(node.size, Some(12));
        assert_eq!(node.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_deserialize_directory_without_size() {
        let node: RemoteNode = serde_json::from_str(r#"{"id": "1", "name": "runs", "type": "DIR"}"#).unwrap();
        assert!(node.can_have_children());
        assert_eq!(node.size, None);
    }
}
