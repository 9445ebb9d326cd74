//! Joining samples onto graph edges by composite key
//!
//! A sample's key is `"<sourceID> <destID>"`, computed with the same
//! identity rules the graph was built with. With service injection a sample
//! contributes to two keys: source to service and service to destination.

use super::labels::TrafficLabels;
use crate::graph::{is_ok, Edge, GraphType, MetadataResult, NodeId, NodeType, TrafficMap};
use crate::source::Sample;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey(String);

impl EdgeKey {
    pub fn new(source: &NodeId, dest: &NodeId) -> Self {
        Self(format!("{source} {dest}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How samples map onto edges for one build
#[derive(Debug, Clone)]
pub struct JoinPlan {
    pub graph_type: GraphType,
    pub inject_service_nodes: bool,
    pub default_cluster: String,
}

impl JoinPlan {
    pub fn new(graph_type: GraphType, inject_service_nodes: bool, default_cluster: impl Into<String>) -> Self {
        Self {
            graph_type,
            inject_service_nodes,
            default_cluster: default_cluster.into(),
        }
    }

    /// Service graphs are always built with injected service nodes.
    pub fn injects_services(&self) -> bool {
        self.inject_service_nodes || self.graph_type == GraphType::Service
    }

    /// Edge endpoints the labels contribute to.
    pub fn legs(&self, labels: &TrafficLabels) -> Vec<(NodeId, NodeId)> {
        let source = labels.source.resolve(self.graph_type).id;
        let dest = labels.dest.resolve(self.graph_type);
        if self.injects_services() && dest.node_type != NodeType::Service && is_ok(&labels.dest.service) {
            let service = labels.dest_service().resolve(self.graph_type).id;
            vec![(source, service.clone()), (service, dest.id)]
        } else {
            vec![(source, dest.id)]
        }
    }

    /// Parse every sample, skipping (and logging) those with missing labels.
    pub fn parse<'a>(&self, samples: &'a [Sample]) -> Vec<(TrafficLabels, &'a Sample)> {
        samples
            .iter()
            .filter_map(|sample| match TrafficLabels::parse(sample, &self.default_cluster) {
                Ok(labels) => Some((labels, sample)),
                Err(e) => {
                    warn!(error = %e, labels = ?sample.labels, "skipping malformed sample");
                    None
                }
            })
            .collect()
    }

    /// Keys each well-formed sample joins onto.
    pub fn keys<'a>(&self, samples: &'a [Sample]) -> Vec<(EdgeKey, &'a Sample)> {
        self.parse(samples)
            .into_iter()
            .flat_map(|(labels, sample)| {
                self.legs(&labels)
                    .into_iter()
                    .map(move |(s, d)| (EdgeKey::new(&s, &d), sample))
            })
            .collect()
    }
}

/// Values accumulated per edge key
#[derive(Debug, Clone)]
pub struct EdgeValueMap<V> {
    values: HashMap<EdgeKey, V>,
}

impl<V> Default for EdgeValueMap<V> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<V> EdgeValueMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &EdgeKey) -> Option<&V> {
        self.values.get(key)
    }

    pub fn get_or_insert_with(&mut self, key: EdgeKey, init: impl FnOnce() -> V) -> &mut V {
        self.values.entry(key).or_insert_with(init)
    }

    /// Insert `value`, or combine it with the existing value via `merge`.
    pub fn upsert(&mut self, key: EdgeKey, value: V, merge: impl FnOnce(&mut V, V)) {
        match self.values.get_mut(&key) {
            Some(existing) => merge(existing, value),
            None => {
                self.values.insert(key, value);
            }
        }
    }

    /// Fold another map into this one.
    pub fn absorb(&mut self, other: EdgeValueMap<V>, mut merge: impl FnMut(&mut V, V)) {
        for (key, value) in other.values {
            match self.values.get_mut(&key) {
                Some(existing) => merge(existing, value),
                None => {
                    self.values.insert(key, value);
                }
            }
        }
    }

    /// Apply `decorate` to every edge of `traffic` whose key has a value.
    ///
    /// Edges without a value are untouched, and no edges are created.
    /// Returns the number of decorated edges.
    pub fn decorate(
        &self,
        traffic: &mut TrafficMap,
        mut decorate: impl FnMut(&mut Edge, &V) -> MetadataResult<()>,
    ) -> MetadataResult<usize> {
        let mut count = 0;
        for node in traffic.nodes_mut() {
            for edge in node.edges.iter_mut() {
                if let Some(value) = self.values.get(&EdgeKey::new(&edge.source, &edge.dest)) {
                    decorate(edge, value)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}
