//! Visualization document types

use crate::graph::{GraphType, Metadata};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Display ID, `n<k>`
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Semantic node ID; empty for synthetic group nodes
    pub node_id: String,
    pub node_type: String,
    pub cluster: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub workload: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub app: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_group: Option<String>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    /// Display ID, `e<k>`
    pub id: String,
    pub source: String,
    pub target: String,
    pub text: String,
    pub color: String,
    #[serde(flatten)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeWrapper {
    pub data: NodeData,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeWrapper {
    pub data: EdgeData,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Elements {
    pub nodes: Vec<NodeWrapper>,
    pub edges: Vec<EdgeWrapper>,
}

/// A rendered graph
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub timestamp: i64,
    pub duration: u64,
    pub graph_type: GraphType,
    pub elements: Elements,
}

impl GraphDocument {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
