//! Aggregate nodes: request classification by a telemetry label
//!
//! Requests carrying the aggregate label are routed through one synthetic
//! node per label value, placed between the caller and the destination
//! (the injected service node when services are injected). The direct
//! edge from caller to destination is replaced by the two classified
//! edges. Only request traffic is classified.

use super::traits::{Appender, AppenderResult};
use crate::graph::{is_ok, GlobalInfo, GraphType, NamespaceInfo, Node, NodeId, TrafficMap};
use crate::source::Sample;
use crate::telemetry::{
    classify_request, query_all, record_traffic_on, JoinPlan, RateSides, TRAFFIC_GROUP_BY,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const NAME: &str = "aggregateNode";

/// Label used when a request selects the appender without naming one.
pub const DEFAULT_AGGREGATE: &str = "request_operation";

/// Which label to aggregate by, optionally narrowed to one value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateOptions {
    pub label: String,
    /// Classify only requests with this label value
    pub value: Option<String>,
    /// With `value`, classify only requests to this service
    pub service: Option<String>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self::new(DEFAULT_AGGREGATE)
    }
}

impl AggregateOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: None,
            service: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct AggregateNodeAppender {
    pub plan: JoinPlan,
    pub options: AggregateOptions,
}

impl AggregateNodeAppender {
    pub fn new(plan: JoinPlan, options: AggregateOptions) -> Self {
        Self { plan, options }
    }

    fn expressions(&self, namespace: &str, secs: u64) -> Vec<String> {
        let label = &self.options.label;
        let group_by = format!("{TRAFFIC_GROUP_BY},request_protocol,response_code,grpc_response_status,{label}");
        let query = |selector: String| {
            format!(
                r#"sum(rate(istio_requests_total{{reporter="destination",{selector}}}[{secs}s])) by ({group_by}) > 0"#
            )
        };
        match &self.options.value {
            Some(value) => {
                let service = self
                    .options
                    .service
                    .as_deref()
                    .map(|s| format!(r#",destination_service_name="{s}""#))
                    .unwrap_or_default();
                vec![query(format!(
                    r#"destination_service_namespace="{namespace}",{label}="{value}"{service}"#
                ))]
            }
            None => vec![
                query(format!(
                    r#"source_workload_namespace!="{namespace}",destination_service_namespace="{namespace}",{label}!="unknown""#
                )),
                query(format!(r#"source_workload_namespace="{namespace}",{label}!="unknown""#)),
            ],
        }
    }

    /// Insert the aggregate node for one sample. Returns whether it was
    /// injected.
    fn inject(&self, traffic: &mut TrafficMap, sample: &Sample) -> AppenderResult<bool> {
        let Some(value) = sample.label(&self.options.label).filter(|v| is_ok(v)) else {
            return Ok(false);
        };
        let Some((protocol, class)) = classify_request(sample) else {
            return Ok(false);
        };
        let Some((labels, _)) = self.plan.parse(std::slice::from_ref(sample)).into_iter().next() else {
            return Ok(false);
        };
        // with an injected service the first leg ends at the service node
        let legs = self.plan.legs(&labels);
        let through_service = legs.len() > 1;
        let Some((source, dest)) = legs.into_iter().next() else {
            return Ok(false);
        };
        if !traffic.contains(&source) || !traffic.contains(&dest) {
            debug!(%source, %dest, value, "aggregate endpoints not in traffic map");
            return Ok(false);
        }

        let aggregate = if through_service {
            Node::aggregate(
                &labels.dest.cluster,
                &labels.dest.service_namespace,
                &self.options.label,
                value,
                &labels.dest.service,
                if is_ok(&labels.dest.app) { &labels.dest.app } else { "" },
            )
        } else {
            Node::aggregate(
                &labels.dest.cluster,
                labels.dest.namespace(),
                &self.options.label,
                value,
                "",
                "",
            )
        };
        let aggregate_id: NodeId = traffic.add_node(aggregate).id.clone();

        if let Some(node) = traffic.get_mut(&source) {
            node.edges.retain(|e| e.dest != dest);
        }
        // caller and destination already carry their rates
        record_traffic_on(traffic, &source, &aggregate_id, protocol, class, sample.value, RateSides::Dest)?;
        record_traffic_on(traffic, &aggregate_id, &dest, protocol, class, sample.value, RateSides::Source)?;
        Ok(true)
    }
}

#[async_trait]
impl Appender for AggregateNodeAppender {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn append_graph(
        &self,
        traffic: &mut TrafficMap,
        global: &mut GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> AppenderResult {
        if traffic.is_empty() || self.plan.graph_type == GraphType::Service {
            return Ok(());
        }
        let expressions = self.expressions(&namespace.name, namespace.duration_secs());
        let passes = query_all(global, namespace, &expressions).await?;

        let mut injected = 0usize;
        for sample in passes.iter().flatten() {
            if self.inject(traffic, sample)? {
                injected += 1;
            }
        }
        debug!(
            namespace = %namespace.name,
            aggregate = %self.options.label,
            injected,
            "aggregate nodes applied"
        );
        Ok(())
    }
}
