//! Dead-node elimination
//!
//! Removes nodes that carry no traffic and have no backing workload, flags
//! nodes whose workload exists but is scaled to zero, and flags leaf
//! service nodes that resolve to mesh-external registrations as egress.

use super::traits::{Appender, AppenderResult};
use super::workload_for;
use crate::graph::{
    is_ok, GlobalInfo, MetadataKey, NamespaceInfo, Node, NodeId, NodeType, TrafficMap,
};
use async_trait::async_trait;
use tracing::debug;

pub const NAME: &str = "deadNode";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Remove,
    Dead,
    Egress,
}

#[derive(Debug, Default, Clone)]
pub struct DeadNodeAppender;

impl DeadNodeAppender {
    pub fn new() -> Self {
        Self
    }

    async fn classify(&self, node: &Node, global: &mut GlobalInfo) -> AppenderResult<Verdict> {
        match node.node_type {
            NodeType::Aggregate | NodeType::Unknown => Ok(Verdict::Keep),
            NodeType::Service => {
                if !node.edges.is_empty() {
                    return Ok(Verdict::Keep);
                }
                let external = global.external_services().await?;
                if external.is_external(&node.service, &node.namespace) {
                    return Ok(Verdict::Egress);
                }
                if node.has_inbound_errors()? {
                    Ok(Verdict::Keep)
                } else {
                    Ok(Verdict::Remove)
                }
            }
            NodeType::App | NodeType::Workload => {
                if node.has_traffic()? {
                    return Ok(Verdict::Keep);
                }
                if !is_ok(&node.workload) && !is_ok(&node.app) {
                    return Ok(Verdict::Keep);
                }
                let workloads = global.workloads(&node.namespace).await?;
                let app_label = global.config.app_label.clone();
                let version_label = global.config.version_label.clone();
                match workload_for(node, &workloads, &app_label, &version_label) {
                    None => Ok(Verdict::Remove),
                    Some(w) if w.pod_count() == 0 => Ok(Verdict::Dead),
                    Some(_) => Ok(Verdict::Keep),
                }
            }
        }
    }
}

#[async_trait]
impl Appender for DeadNodeAppender {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn append_graph(
        &self,
        traffic: &mut TrafficMap,
        global: &mut GlobalInfo,
        _namespace: &NamespaceInfo,
    ) -> AppenderResult {
        if traffic.is_empty() {
            return Ok(());
        }

        let mut removed: Vec<NodeId> = Vec::new();
        let mut dead = 0usize;
        for id in traffic.ids() {
            let Some(node) = traffic.get(&id) else { continue };
            let verdict = self.classify(node, global).await?;
            match verdict {
                Verdict::Keep => {}
                Verdict::Remove => removed.push(id),
                Verdict::Dead => {
                    if let Some(node) = traffic.get_mut(&id) {
                        node.metadata.set_flag(MetadataKey::IsDead);
                        dead += 1;
                    }
                }
                Verdict::Egress => {
                    if let Some(node) = traffic.get_mut(&id) {
                        node.metadata.set_flag(MetadataKey::IsEgress);
                    }
                }
            }
        }

        for id in &removed {
            traffic.remove(id);
        }
        let dropped_edges = traffic.remove_dangling_edges();
        debug!(
            removed = removed.len(),
            dead,
            dropped_edges,
            "dead node pruning complete"
        );
        Ok(())
    }
}
