//! Sidecar presence check

use super::traits::{Appender, AppenderResult};
use super::backing_workloads;
use crate::graph::{GlobalInfo, MetadataKey, NamespaceInfo, NodeType, TrafficMap};
use async_trait::async_trait;
use tracing::debug;

pub const NAME: &str = "sidecarsCheck";

/// Flags `hasMissingSidecars` on nodes backed by any pod without a sidecar.
#[derive(Debug, Default, Clone)]
pub struct SidecarsAppender;

impl SidecarsAppender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Appender for SidecarsAppender {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn append_graph(
        &self,
        traffic: &mut TrafficMap,
        global: &mut GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> AppenderResult {
        // infrastructure workloads are not injected
        if traffic.is_empty() || namespace.name == global.config.istio_namespace {
            return Ok(());
        }
        let workloads = global.workloads(&namespace.name).await?;
        let app_label = global.config.app_label.clone();
        let version_label = global.config.version_label.clone();

        let mut flagged = 0usize;
        for node in traffic.nodes_mut() {
            if node.namespace != namespace.name
                || matches!(node.node_type, NodeType::Aggregate | NodeType::Service | NodeType::Unknown)
            {
                continue;
            }
            let missing = backing_workloads(node, &workloads, &app_label, &version_label)
                .iter()
                .any(|w| w.pods.iter().any(|p| !p.has_sidecar));
            if missing {
                node.metadata.set_flag(MetadataKey::HasMissingSidecars);
                flagged += 1;
            }
        }
        debug!(namespace = %namespace.name, flagged, "sidecar check complete");
        Ok(())
    }
}
