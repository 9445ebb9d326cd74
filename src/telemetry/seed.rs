//! Initial traffic ingestion
//!
//! Builds a namespace's traffic map before any appender runs, either from
//! request and TCP telemetry or from caller-provided maps.

use super::direction::{directions, TRAFFIC_GROUP_BY};
use super::join::JoinPlan;
use super::labels::TrafficLabels;
use super::protocol::{classify_request, record_traffic, Protocol, ResponseClass};
use super::query::query_all;
use crate::graph::{GlobalInfo, MetadataResult, NamespaceInfo, Node, TrafficMap};
use crate::source::SourceError;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Metadata(#[from] crate::graph::MetadataError),
}

/// Where the initial traffic of each namespace comes from
#[derive(Debug, Clone, Default)]
pub enum TrafficSeed {
    /// Query request and TCP telemetry
    #[default]
    Telemetry,
    /// Caller-built maps keyed by namespace; missing namespaces start empty
    Static(HashMap<String, TrafficMap>),
}

impl TrafficSeed {
    pub async fn namespace_traffic(
        &self,
        global: &GlobalInfo,
        namespace: &NamespaceInfo,
        plan: &JoinPlan,
        include_istio: bool,
    ) -> Result<TrafficMap, SeedError> {
        match self {
            TrafficSeed::Static(maps) => Ok(maps.get(&namespace.name).cloned().unwrap_or_default()),
            TrafficSeed::Telemetry => telemetry_traffic(global, namespace, plan, include_istio).await,
        }
    }
}

async fn telemetry_traffic(
    global: &GlobalInfo,
    namespace: &NamespaceInfo,
    plan: &JoinPlan,
    include_istio: bool,
) -> Result<TrafficMap, SeedError> {
    let dirs = directions(&namespace.name, &global.config.istio_namespace, include_istio);
    let secs = namespace.duration_secs();

    let mut expressions: Vec<String> = dirs
        .iter()
        .map(|d| {
            format!(
                "sum(rate(istio_requests_total{{{}}}[{secs}s])) by ({TRAFFIC_GROUP_BY},request_protocol,response_code,grpc_response_status)",
                d.selector
            )
        })
        .collect();
    expressions.extend(dirs.iter().map(|d| {
        format!(
            "sum(rate(istio_tcp_sent_bytes_total{{{}}}[{secs}s])) by ({TRAFFIC_GROUP_BY})",
            d.selector
        )
    }));

    let results = query_all(global, namespace, &expressions).await?;
    let (requests, tcp) = results.split_at(dirs.len());

    let mut traffic = TrafficMap::new();
    for samples in requests {
        for (labels, sample) in plan.parse(samples) {
            let Some((protocol, class)) = classify_request(sample) else {
                warn!(protocol = ?sample.label("request_protocol"), "skipping sample with unsupported protocol");
                continue;
            };
            add_sample(&mut traffic, plan, &labels, protocol, class, sample.value)?;
        }
    }
    for samples in tcp {
        for (labels, sample) in plan.parse(samples) {
            add_sample(&mut traffic, plan, &labels, Protocol::Tcp, ResponseClass::Ok, sample.value)?;
        }
    }

    debug!(
        namespace = %namespace.name,
        nodes = traffic.len(),
        edges = traffic.edge_count(),
        "seeded traffic map from telemetry"
    );
    Ok(traffic)
}

/// Add the nodes and edges one sample describes.
pub fn add_sample(
    traffic: &mut TrafficMap,
    plan: &JoinPlan,
    labels: &TrafficLabels,
    protocol: Protocol,
    class: ResponseClass,
    value: f64,
) -> MetadataResult<()> {
    let legs = plan.legs(labels);

    traffic.add_node(Node::new(&labels.source, plan.graph_type));
    let dest = traffic.add_node(Node::new(&labels.dest, plan.graph_type));
    dest.add_dest_service(&labels.dest.service_namespace, &labels.dest.service)?;
    if legs.len() > 1 {
        traffic.add_node(Node::new(&labels.dest_service(), plan.graph_type));
    }

    for (source, dest) in &legs {
        record_traffic(traffic, source, dest, protocol, class, value)?;
    }
    Ok(())
}
