//! Ordered appender chain built from a request

use super::traits::Appender;
use super::{
    aggregate_node, dead_node, health, mesh_config, response_time, security_policy, sidecars,
    throughput, unused_node, AggregateNodeAppender, DeadNodeAppender, HealthAppender,
    MeshConfigAppender, ResponseTimeAppender, SecurityPolicyAppender, SidecarsAppender,
    ThroughputAppender, UnusedNodeAppender,
};
use crate::config::GraphConfig;
use crate::graph::{GlobalInfo, NamespaceInfo, TrafficMap};
use crate::pipeline::{GraphError, GraphRequest, GraphResult};
use crate::telemetry::JoinPlan;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// Execution order of the built-in appenders.
pub const APPENDER_ORDER: [&str; 9] = [
    dead_node::NAME,
    response_time::NAME,
    security_policy::NAME,
    throughput::NAME,
    aggregate_node::NAME,
    unused_node::NAME,
    mesh_config::NAME,
    sidecars::NAME,
    health::NAME,
];

/// Appenders run when a request selects none. Aggregation and health run
/// only on request.
pub const DEFAULT_APPENDERS: [&str; 7] = [
    dead_node::NAME,
    response_time::NAME,
    security_policy::NAME,
    throughput::NAME,
    unused_node::NAME,
    mesh_config::NAME,
    sidecars::NAME,
];

/// Appenders run sequentially, in list order, once per namespace.
pub struct AppenderChain {
    appenders: Vec<Arc<dyn Appender>>,
}

impl AppenderChain {
    /// Create a chain from `appenders`, keeping the first of any duplicate names.
    pub fn new(appenders: Vec<Arc<dyn Appender>>) -> Self {
        let mut seen = HashSet::new();
        let appenders = appenders
            .into_iter()
            .filter(|a| seen.insert(a.name()))
            .collect();
        Self { appenders }
    }

    /// Build the chain a request selects, in [`APPENDER_ORDER`].
    ///
    /// No selection means [`DEFAULT_APPENDERS`].
    pub fn from_request(request: &GraphRequest, config: &GraphConfig) -> GraphResult<Self> {
        let selected: Vec<&str> = match &request.appenders {
            None => DEFAULT_APPENDERS.to_vec(),
            Some(names) => {
                for name in names {
                    if !APPENDER_ORDER.contains(&name.as_str()) {
                        return Err(GraphError::UnknownAppender(name.clone()));
                    }
                }
                APPENDER_ORDER
                    .iter()
                    .copied()
                    .filter(|n| names.iter().any(|s| s.as_str() == *n))
                    .collect()
            }
        };

        let plan = JoinPlan::new(
            request.graph_type,
            request.inject_service_nodes,
            config.default_cluster.clone(),
        );
        let quantile = request
            .response_time_quantile
            .unwrap_or(config.response_time_quantile);

        let appenders = selected
            .into_iter()
            .map(|name| -> Arc<dyn Appender> {
                match name {
                    dead_node::NAME => Arc::new(DeadNodeAppender::new()),
                    response_time::NAME => Arc::new(ResponseTimeAppender::new(
                        plan.clone(),
                        quantile,
                        request.include_istio,
                    )),
                    security_policy::NAME => {
                        Arc::new(SecurityPolicyAppender::new(plan.clone(), request.include_istio))
                    }
                    throughput::NAME => Arc::new(ThroughputAppender::new(
                        plan.clone(),
                        request.throughput_type,
                        request.include_istio,
                    )),
                    aggregate_node::NAME => Arc::new(AggregateNodeAppender::new(
                        plan.clone(),
                        request.aggregate.clone().unwrap_or_default(),
                    )),
                    unused_node::NAME => Arc::new(UnusedNodeAppender::new(request.graph_type)),
                    mesh_config::NAME => Arc::new(MeshConfigAppender::new()),
                    health::NAME => Arc::new(HealthAppender::new()),
                    _ => Arc::new(SidecarsAppender::new()),
                }
            })
            .collect();
        Ok(Self::new(appenders))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.appenders.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.appenders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appenders.is_empty()
    }

    /// Run every appender against one namespace's traffic map.
    ///
    /// The first failure aborts the chain.
    pub async fn run(
        &self,
        traffic: &mut TrafficMap,
        global: &mut GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> GraphResult<()> {
        for appender in &self.appenders {
            global.deadline.check()?;
            let name = appender.name();
            let span = info_span!("appender", appender = name, namespace = %namespace.name);
            appender
                .append_graph(traffic, global, namespace)
                .instrument(span)
                .await
                .map_err(|source| GraphError::Appender {
                    appender: name,
                    source,
                })?;
        }
        Ok(())
    }
}
