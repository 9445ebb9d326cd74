//! Response-time decoration of edges

use super::fusion::directional_samples;
use super::traits::{Appender, AppenderResult};
use crate::graph::{GlobalInfo, MetadataKey, NamespaceInfo, TrafficMap};
use crate::telemetry::{EdgeValueMap, JoinPlan, TRAFFIC_GROUP_BY};
use async_trait::async_trait;
use tracing::debug;

pub const NAME: &str = "responseTime";

/// Attaches `responseTime` (milliseconds) to edges with successful requests.
///
/// A quantile in `(0, 1)` selects a histogram quantile; zero selects the mean.
#[derive(Debug, Clone)]
pub struct ResponseTimeAppender {
    pub plan: JoinPlan,
    pub quantile: f64,
    pub include_istio: bool,
}

impl ResponseTimeAppender {
    pub fn new(plan: JoinPlan, quantile: f64, include_istio: bool) -> Self {
        Self {
            plan,
            quantile,
            include_istio,
        }
    }

    fn expression(&self, selector: &str, secs: u64) -> String {
        let selector = format!(r#"{selector},response_code=~"2[0-9]{{2}}""#);
        if self.quantile > 0.0 && self.quantile < 1.0 {
            format!(
                "histogram_quantile({}, sum(rate(istio_request_duration_milliseconds_bucket{{{selector}}}[{secs}s])) by (le,{TRAFFIC_GROUP_BY}))",
                self.quantile
            )
        } else {
            format!(
                "sum(rate(istio_request_duration_milliseconds_sum{{{selector}}}[{secs}s])) by ({TRAFFIC_GROUP_BY}) / sum(rate(istio_request_duration_milliseconds_count{{{selector}}}[{secs}s])) by ({TRAFFIC_GROUP_BY})"
            )
        }
    }
}

#[async_trait]
impl Appender for ResponseTimeAppender {
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
        let passes = directional_samples(global, namespace, self.include_istio, |d| {
            self.expression(&d.selector, secs)
        })
        .await?;

        // an edge reported by several partitions keeps its worst latency
        let mut times: EdgeValueMap<f64> = EdgeValueMap::new();
        for samples in &passes {
            for (key, sample) in self.plan.keys(samples) {
                if !sample.value.is_finite() {
                    continue;
                }
                times.upsert(key, sample.value, |a, b| *a = a.max(b));
            }
        }

        let decorated = times.decorate(traffic, |edge, value| {
            edge.metadata.insert(MetadataKey::ResponseTime, *value);
            Ok(())
        })?;
        debug!(namespace = %namespace.name, keys = times.len(), decorated, "response times applied");
        Ok(())
    }
}
