//! Telemetry sample builders

use meshgraph::graph::{GraphType, NodeId, NodeIdentity, TrafficMap};
use meshgraph::source::Sample;
use meshgraph::telemetry::{add_sample, JoinPlan, Protocol, ResponseClass};

/// One side of an observed request
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub namespace: &'a str,
    pub workload: &'a str,
    pub app: &'a str,
    pub version: &'a str,
}

pub const UNKNOWN_SOURCE: Endpoint<'static> = Endpoint {
    namespace: "unknown",
    workload: "unknown",
    app: "unknown",
    version: "unknown",
};

pub fn workload<'a>(namespace: &'a str, workload: &'a str, app: &'a str, version: &'a str) -> Endpoint<'a> {
    Endpoint {
        namespace,
        workload,
        app,
        version,
    }
}

/// The mesh ingress gateway.
pub fn ingress() -> Endpoint<'static> {
    workload("istio-system", "istio-ingressgateway", "istio-ingressgateway", "unknown")
}

/// A sample carrying every identity label of a `source` to `dest` request
/// addressed to `service`.
pub fn traffic_sample(source: Endpoint, service: &str, dest: Endpoint, value: f64) -> Sample {
    Sample::new(
        [
            ("source_workload_namespace", source.namespace),
            ("source_workload", source.workload),
            ("source_app", source.app),
            ("source_version", source.version),
            ("destination_service_namespace", dest.namespace),
            ("destination_service_name", service),
            ("destination_workload_namespace", dest.namespace),
            ("destination_workload", dest.workload),
            ("destination_app", dest.app),
            ("destination_version", dest.version),
        ],
        value,
    )
}

pub fn with_labels(mut sample: Sample, extra: &[(&str, &str)]) -> Sample {
    for (k, v) in extra {
        sample.labels.insert(k.to_string(), v.to_string());
    }
    sample
}

/// Seed a traffic map from successful HTTP samples, exactly as the
/// telemetry seed would.
pub fn seed_map(graph_type: GraphType, inject_services: bool, samples: &[Sample]) -> TrafficMap {
    let plan = JoinPlan::new(graph_type, inject_services, "unknown");
    let mut traffic = TrafficMap::new();
    for (labels, sample) in plan.parse(samples) {
        add_sample(&mut traffic, &plan, &labels, Protocol::Http, ResponseClass::Ok, sample.value)
            .expect("fresh metadata has no type conflicts");
    }
    traffic
}

/// ID of the node `endpoint` resolves to under `graph_type`.
pub fn node_id(endpoint: Endpoint, graph_type: GraphType) -> NodeId {
    NodeIdentity::workload("unknown", endpoint.namespace, endpoint.workload, endpoint.app, endpoint.version)
        .resolve(graph_type)
        .id
}
