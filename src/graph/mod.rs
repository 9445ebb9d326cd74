//! Core graph data structures

mod edge;
mod identity;
mod info;
mod metadata;
mod node;
mod traffic_map;


pub use edge::Edge;
pub use identity::{
    aggregate_id, is_ok, is_ok_version, GraphType, NodeId, NodeIdentity, NodeType, ResolvedId,
    UNKNOWN,
};
pub use info::{ExternalServices, GlobalInfo, NamespaceInfo};
pub use metadata::{Metadata, MetadataError, MetadataKey, MetadataResult, MetadataValue};
pub use node::Node;
pub use traffic_map::TrafficMap;
