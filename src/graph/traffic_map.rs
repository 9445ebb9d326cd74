//! The traffic map threaded through a graph build

use super::edge::Edge;
use super::identity::NodeId;
use super::node::Node;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Mapping from node ID to node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficMap {
    nodes: HashMap<NodeId, Node>,
}

impl TrafficMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Insert `node` unless a node with the same ID exists; returns the
    /// entry in the map either way.
    pub fn add_node(&mut self, node: Node) -> &mut Node {
        self.nodes.entry(node.id.clone()).or_insert(node)
    }

    /// Insert `node`, replacing any node with the same ID.
    pub fn replace(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id.clone(), node)
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.nodes.remove(id)
    }

    /// Snapshot of node IDs in sorted order, for worklist traversals.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.nodes.values().flat_map(|n| n.edges.iter())
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.edges.len()).sum()
    }

    /// IDs of every node that is the destination of some edge.
    pub fn destinations(&self) -> HashSet<NodeId> {
        self.edges().map(|e| e.dest.clone()).collect()
    }

    /// Drop edges whose destination is no longer in the map.
    ///
    /// Returns the number of edges removed.
    pub fn remove_dangling_edges(&mut self) -> usize {
        let present: HashSet<NodeId> = self.nodes.keys().cloned().collect();
        let mut removed = 0;
        for node in self.nodes.values_mut() {
            let before = node.edges.len();
            node.edges.retain(|e| present.contains(&e.dest));
            removed += before - node.edges.len();
        }
        removed
    }

    pub fn into_nodes(self) -> impl Iterator<Item = Node> {
        self.nodes.into_values()
    }
}

impl FromIterator<Node> for TrafficMap {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut map = TrafficMap::new();
        for node in iter {
            map.add_node(node);
        }
        map
    }
}
