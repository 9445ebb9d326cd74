//! Unused-node synthesis
//!
//! Adds phantom nodes for inventory workloads that produced no traffic and
//! links them to the nodes already calling other instances of the same app.

use super::traits::{Appender, AppenderResult};
use crate::graph::{
    is_ok, GlobalInfo, GraphType, MetadataKey, NamespaceInfo, Node, NodeId, NodeIdentity,
    TrafficMap, UNKNOWN,
};
use crate::source::Workload;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

pub const NAME: &str = "unusedNode";

#[derive(Debug, Clone)]
pub struct UnusedNodeAppender {
    pub graph_type: GraphType,
}

impl UnusedNodeAppender {
    pub fn new(graph_type: GraphType) -> Self {
        Self { graph_type }
    }

    fn phantom(&self, workload: &Workload, cluster: &str, namespace: &str, app_label: &str, version_label: &str) -> Node {
        let identity = NodeIdentity::workload(
            cluster,
            namespace,
            workload.name.clone(),
            workload.label(app_label).unwrap_or(UNKNOWN),
            workload.label(version_label).unwrap_or(UNKNOWN),
        );
        let mut node = Node::new(&identity, self.graph_type);
        node.metadata.insert(MetadataKey::HttpIn, 0.0);
        node.metadata.insert(MetadataKey::HttpOut, 0.0);
        node.metadata.set_flag(MetadataKey::IsUnused);
        node
    }
}

#[async_trait]
impl Appender for UnusedNodeAppender {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn append_graph(
        &self,
        traffic: &mut TrafficMap,
        global: &mut GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> AppenderResult {
        let workloads = global.workloads(&namespace.name).await?;
        let cluster = global.config.default_cluster.clone();
        let app_label = global.config.app_label.clone();
        let version_label = global.config.version_label.clone();

        let mut phantoms: Vec<Node> = Vec::new();
        for workload in workloads.iter() {
            let node = self.phantom(workload, &cluster, &namespace.name, &app_label, &version_label);
            if !traffic.contains(&node.id) && !phantoms.iter().any(|p| p.id == node.id) {
                phantoms.push(node);
            }
        }

        if traffic.is_empty() {
            let added = phantoms.len();
            for node in phantoms {
                traffic.add_node(node);
            }
            debug!(namespace = %namespace.name, added, "graph built from unused nodes only");
            return Ok(());
        }

        // (namespace, app) of every node present before synthesis
        let apps: HashMap<NodeId, (String, String)> = traffic
            .nodes()
            .map(|n| (n.id.clone(), (n.namespace.clone(), n.app.clone())))
            .collect();

        let mut siblings = 0usize;
        let added = phantoms.len();
        for phantom in phantoms {
            let phantom_id = phantom.id.clone();
            let app = phantom.app.clone();
            let phantom_namespace = phantom.namespace.clone();
            traffic.add_node(phantom);
            if !is_ok(&app) {
                continue;
            }

            let sources: Vec<NodeId> = traffic
                .ids()
                .into_iter()
                .filter(|id| {
                    traffic.get(id).is_some_and(|n| {
                        n.edges.iter().any(|e| {
                            e.dest != phantom_id
                                && apps
                                    .get(&e.dest)
                                    .is_some_and(|(ns, a)| *ns == phantom_namespace && *a == app)
                        })
                    })
                })
                .collect();
            for source in sources {
                if let Some(node) = traffic.get_mut(&source) {
                    node.add_edge(&phantom_id);
                    siblings += 1;
                }
            }
        }
        debug!(namespace = %namespace.name, added, siblings, "unused nodes added");
        Ok(())
    }
}
