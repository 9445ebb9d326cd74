//! Throughput decoration of HTTP edges

use super::fusion::directional_samples;
use super::traits::{Appender, AppenderResult};
use crate::graph::{GlobalInfo, MetadataKey, NamespaceInfo, TrafficMap};
use crate::telemetry::{EdgeValueMap, JoinPlan, Protocol, TRAFFIC_GROUP_BY};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const NAME: &str = "throughput";

/// Which payload the throughput measures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThroughputType {
    Request,
    #[default]
    Response,
}

impl ThroughputType {
    fn metric(&self) -> &'static str {
        match self {
            ThroughputType::Request => "istio_request_bytes_sum",
            ThroughputType::Response => "istio_response_bytes_sum",
        }
    }
}

/// Attaches `throughput` (bytes per second) to HTTP edges.
#[derive(Debug, Clone)]
pub struct ThroughputAppender {
    pub plan: JoinPlan,
    pub throughput_type: ThroughputType,
    pub include_istio: bool,
}

impl ThroughputAppender {
    pub fn new(plan: JoinPlan, throughput_type: ThroughputType, include_istio: bool) -> Self {
        Self {
            plan,
            throughput_type,
            include_istio,
        }
    }
}

#[async_trait]
impl Appender for ThroughputAppender {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn append_graph(
        &self,
        traffic: &mut TrafficMap,
        global: &mut GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> AppenderResult {
        if traffic.is_empty() {
            return Ok(());
        }
        let secs = namespace.duration_secs();
        let metric = self.throughput_type.metric();
        let passes = directional_samples(global, namespace, self.include_istio, |d| {
            format!(
                "sum(rate({metric}{{{}}}[{secs}s])) by ({TRAFFIC_GROUP_BY}) > 0",
                d.selector
            )
        })
        .await?;

        // partitions are disjoint, so bytes add up across them
        let mut bytes: EdgeValueMap<f64> = EdgeValueMap::new();
        for samples in &passes {
            for (key, sample) in self.plan.keys(samples) {
                bytes.upsert(key, sample.value, |a, b| *a += b);
            }
        }

        let decorated = bytes.decorate(traffic, |edge, value| {
            if edge.protocol()? == Some(Protocol::Http.as_str()) {
                edge.metadata.insert(MetadataKey::Throughput, *value);
            }
            Ok(())
        })?;
        debug!(namespace = %namespace.name, keys = bytes.len(), decorated, "throughput applied");
        Ok(())
    }
}
