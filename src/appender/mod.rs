//! Appenders: the ordered enrichment stages of a graph build
//!
//! Pruning runs first, then telemetry fusion, then request aggregation and
//! synthesis of unused nodes, then the configuration and health checks.
//! [`AppenderChain`] owns that order.

pub mod aggregate_node;
mod chain;
pub mod dead_node;
mod fusion;
pub mod health;
pub mod mesh_config;
pub mod response_time;
pub mod security_policy;
pub mod sidecars;
pub mod throughput;
mod traits;
pub mod unused_node;


pub use aggregate_node::{AggregateNodeAppender, AggregateOptions};
pub use chain::{AppenderChain, APPENDER_ORDER, DEFAULT_APPENDERS};
pub use dead_node::DeadNodeAppender;
pub use health::HealthAppender;
pub use mesh_config::MeshConfigAppender;
pub use response_time::ResponseTimeAppender;
pub use security_policy::SecurityPolicyAppender;
pub use sidecars::SidecarsAppender;
pub use throughput::{ThroughputAppender, ThroughputType};
pub use traits::{Appender, AppenderError, AppenderResult};
pub use unused_node::UnusedNodeAppender;

use crate::graph::{is_ok, Node};
use crate::source::Workload;

fn matches_app_version(node: &Node, workload: &Workload, app_label: &str, version_label: &str) -> bool {
    workload.label(app_label) == Some(node.app.as_str())
        && (!is_ok(&node.version) || workload.label(version_label) == Some(node.version.as_str()))
}

/// The workload backing `node`: by name when the node has one, otherwise by
/// app and version labels.
pub(crate) fn workload_for<'a>(
    node: &Node,
    workloads: &'a [Workload],
    app_label: &str,
    version_label: &str,
) -> Option<&'a Workload> {
    if is_ok(&node.workload) {
        return workloads.iter().find(|w| w.name == node.workload);
    }
    workloads
        .iter()
        .find(|w| matches_app_version(node, w, app_label, version_label))
}

/// Every workload that may back `node`.
pub(crate) fn backing_workloads<'a>(
    node: &Node,
    workloads: &'a [Workload],
    app_label: &str,
    version_label: &str,
) -> Vec<&'a Workload> {
    if is_ok(&node.workload) {
        return workloads.iter().filter(|w| w.name == node.workload).collect();
    }
    if !is_ok(&node.app) {
        return Vec::new();
    }
    workloads
        .iter()
        .filter(|w| matches_app_version(node, w, app_label, version_label))
        .collect()
}
