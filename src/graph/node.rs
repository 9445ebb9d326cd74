//! Node representation in the traffic graph

use super::edge::Edge;
use super::identity::{
    aggregate_id, is_ok, is_ok_version, GraphType, NodeId, NodeIdentity, NodeType, UNKNOWN,
};
use super::metadata::{Metadata, MetadataError, MetadataKey, MetadataResult, MetadataValue};
use serde::Serialize;

/// One graph entity at the granularity of the graph being built
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub cluster: String,
    pub namespace: String,
    pub workload: String,
    pub app: String,
    pub version: String,
    pub service: String,
    pub edges: Vec<Edge>,
    pub metadata: Metadata,
}

impl Node {
    /// Create a node for `identity` under `graph_type`.
    ///
    /// Fields irrelevant to the resolved node type are cleared so that the
    /// same logical entity always produces an identical node.
    pub fn new(identity: &NodeIdentity, graph_type: GraphType) -> Self {
        let resolved = identity.resolve(graph_type);
        let mut workload = identity.workload.clone();
        let mut app = identity.app.clone();
        let mut version = identity.version.clone();
        let mut service = identity.service.clone();

        match resolved.node_type {
            NodeType::Workload => {
                if app == UNKNOWN {
                    app.clear();
                }
                if version == UNKNOWN {
                    version.clear();
                }
                service.clear();
            }
            NodeType::App => {
                if graph_type == GraphType::VersionedApp {
                    if !is_ok(&workload) {
                        workload.clear();
                    }
                    if !is_ok_version(&version) {
                        version.clear();
                    }
                } else {
                    workload.clear();
                    version.clear();
                }
                service.clear();
            }
            NodeType::Service => {
                workload.clear();
                app.clear();
                version.clear();
                if !is_ok(&service) {
                    service = UNKNOWN.to_string();
                }
            }
            NodeType::Aggregate | NodeType::Unknown => {}
        }

        Self {
            id: resolved.id,
            node_type: resolved.node_type,
            cluster: identity.cluster.clone(),
            namespace: resolved.namespace,
            workload,
            app,
            version,
            service,
            edges: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Create the aggregate node for requests labelled `aggregate=value`.
    ///
    /// `service` and `app` are set when the aggregate is attached to an
    /// injected service node, and left empty otherwise.
    pub fn aggregate(
        cluster: &str,
        namespace: &str,
        aggregate: &str,
        value: &str,
        service: &str,
        app: &str,
    ) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(MetadataKey::Aggregate, aggregate);
        metadata.insert(MetadataKey::AggregateValue, value);
        Self {
            id: aggregate_id(cluster, namespace, aggregate, value, service),
            node_type: NodeType::Aggregate,
            cluster: cluster.to_string(),
            namespace: namespace.to_string(),
            workload: String::new(),
            app: app.to_string(),
            version: String::new(),
            service: service.to_string(),
            edges: Vec::new(),
            metadata,
        }
    }

    /// Add an edge to `dest`, or return the existing one.
    pub fn add_edge(&mut self, dest: &NodeId) -> &mut Edge {
        let pos = match self.edges.iter().position(|e| &e.dest == dest) {
            Some(pos) => pos,
            None => {
                self.edges.push(Edge::new(self.id.clone(), dest.clone()));
                self.edges.len() - 1
            }
        };
        &mut self.edges[pos]
    }

    pub fn edge_to(&self, dest: &NodeId) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.dest == dest)
    }

    /// An app node of a versioned-app graph, backed by one workload or
    /// pinned to one version.
    pub fn is_versioned_app(&self) -> bool {
        self.node_type == NodeType::App && (!self.workload.is_empty() || !self.version.is_empty())
    }

    /// Record that this node was reached through `service` in `namespace`.
    pub fn add_dest_service(&mut self, namespace: &str, service: &str) -> MetadataResult<()> {
        if !is_ok(service) {
            return Ok(());
        }
        self.metadata
            .record_mut(MetadataKey::DestServices)?
            .insert(service.to_string(), MetadataValue::Text(namespace.to_string()));
        Ok(())
    }

    /// Names of the services this node was reached through.
    pub fn dest_services(&self) -> MetadataResult<Vec<String>> {
        Ok(self
            .metadata
            .record(MetadataKey::DestServices)?
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// `(service, namespace)` of every service this node was reached through.
    pub fn dest_service_refs(&self) -> MetadataResult<Vec<(String, String)>> {
        let Some(record) = self.metadata.record(MetadataKey::DestServices)? else {
            return Ok(Vec::new());
        };
        record
            .iter()
            .map(|(service, namespace)| match namespace {
                MetadataValue::Text(ns) => Ok((service.clone(), ns.clone())),
                other => Err(MetadataError::TypeMismatch {
                    key: MetadataKey::DestServices,
                    expected: "text",
                    found: other.shape(),
                }),
            })
            .collect()
    }

    /// Whether any inbound or outbound traffic rate is positive.
    pub fn has_traffic(&self) -> MetadataResult<bool> {
        for key in MetadataKey::NODE_TRAFFIC_RATES {
            if self.metadata.rate(key)? > 0.0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether any inbound error rate is positive.
    pub fn has_inbound_errors(&self) -> MetadataResult<bool> {
        for key in MetadataKey::NODE_ERROR_RATES {
            if self.metadata.rate(key)? > 0.0 {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
