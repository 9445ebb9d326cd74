//! The bookinfo demo mesh

use chrono::Utc;
use meshgraph::graph::{GlobalInfo, NamespaceInfo};
use meshgraph::source::{BuildDeadline, SourceSet, StaticMesh, StaticMetrics, Workload};
use meshgraph::GraphConfig;
use std::sync::Arc;
use std::time::Duration;

pub const BOOKINFO: &str = "bookinfo";

fn versioned(name: &str, app: &str, version: &str, pods: usize) -> Workload {
    let mut w = Workload::new(name)
        .with_label("app", app)
        .with_label("version", version);
    for i in 0..pods {
        w = w.with_pod(format!("{name}-{i}"), true);
    }
    w
}

pub fn bookinfo_workloads() -> Vec<Workload> {
    vec![
        versioned("productpage-v1", "productpage", "v1", 1),
        versioned("details-v1", "details", "v1", 1),
        versioned("reviews-v1", "reviews", "v1", 1),
        versioned("reviews-v2", "reviews", "v2", 1),
        versioned("reviews-v3", "reviews", "v3", 1),
        versioned("ratings-v1", "ratings", "v1", 1),
    ]
}

pub fn bookinfo_mesh() -> StaticMesh {
    StaticMesh::new().with_workloads(BOOKINFO, bookinfo_workloads())
}

/// Build context over `mesh` and `metrics` with default configuration.
pub fn global_info(mesh: StaticMesh, metrics: StaticMetrics) -> GlobalInfo {
    global_with_metrics(mesh, Arc::new(metrics))
}

/// Like [`global_info`], keeping a handle on the metrics client.
pub fn global_with_metrics(mesh: StaticMesh, metrics: Arc<StaticMetrics>) -> GlobalInfo {
    let mesh = Arc::new(mesh);
    let sources = SourceSet::new(metrics, mesh.clone(), mesh.clone(), mesh.clone()).with_health(mesh);
    GlobalInfo::new(
        sources,
        Arc::new(GraphConfig::default()),
        BuildDeadline::new(),
        vec![BOOKINFO.to_string()],
    )
}

pub fn namespace_info(name: &str) -> NamespaceInfo {
    NamespaceInfo::new(name, Duration::from_secs(600), None, Utc::now())
}
