//! Directed traffic edge

use super::identity::NodeId;
use super::metadata::{Metadata, MetadataResult};
use serde::Serialize;

/// A directed edge, owned by its source node's adjacency list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub dest: NodeId,
    pub metadata: Metadata,
}

impl Edge {
    pub fn new(source: NodeId, dest: NodeId) -> Self {
        Self {
            source,
            dest,
            metadata: Metadata::new(),
        }
    }

    /// Protocol recorded on the edge, if any.
    pub fn protocol(&self) -> MetadataResult<Option<&str>> {
        self.metadata.text(super::MetadataKey::Protocol)
    }
}
