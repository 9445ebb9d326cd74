//! Health decoration of app, service and workload nodes

use super::traits::{Appender, AppenderResult};
use crate::graph::{is_ok, GlobalInfo, MetadataKey, MetadataValue, NamespaceInfo, Node, NodeType, TrafficMap};
use crate::source::{Health, HealthKind, NamespaceHealth};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, trace};

pub const NAME: &str = "health";

fn health_record(health: Option<&Health>) -> MetadataValue {
    let mut record = BTreeMap::new();
    if let Some(h) = health {
        record.insert("status".to_string(), MetadataValue::Text(h.status.as_str().to_string()));
        if let Some(n) = h.available_replicas {
            record.insert("availableReplicas".to_string(), MetadataValue::Float(f64::from(n)));
        }
        if let Some(n) = h.desired_replicas {
            record.insert("desiredReplicas".to_string(), MetadataValue::Float(f64::from(n)));
        }
        if let Some(ratio) = h.error_ratio {
            record.insert("errorRatio".to_string(), MetadataValue::Float(ratio));
        }
    }
    MetadataValue::Record(record)
}

/// Health lookups `node` needs, as (kind, name) pairs.
fn lookups(node: &Node) -> Vec<(HealthKind, &str)> {
    match node.node_type {
        NodeType::App if is_ok(&node.workload) => {
            vec![(HealthKind::App, node.app.as_str()), (HealthKind::Workload, node.workload.as_str())]
        }
        NodeType::App => vec![(HealthKind::App, node.app.as_str())],
        NodeType::Service => vec![(HealthKind::Service, node.service.as_str())],
        NodeType::Workload => vec![(HealthKind::Workload, node.workload.as_str())],
        NodeType::Aggregate | NodeType::Unknown => Vec::new(),
    }
}

/// Attaches `healthData` to every app, service and workload node of an
/// accessible namespace.
///
/// App nodes backed by a workload carry the workload's health, with the
/// app's own health under `healthDataApp`. Nodes without reported health
/// get an empty record.
#[derive(Debug, Default, Clone)]
pub struct HealthAppender;

impl HealthAppender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Appender for HealthAppender {
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

        let mut requests: BTreeSet<(String, HealthKind)> = BTreeSet::new();
        for node in traffic.nodes() {
            if !global.is_accessible(&node.namespace) {
                continue;
            }
            for (kind, _) in lookups(node) {
                requests.insert((node.namespace.clone(), kind));
            }
        }
        if requests.is_empty() {
            return Ok(());
        }

        let source = global.sources.health.clone();
        let fetched = global
            .deadline
            .guard(try_join_all(requests.iter().map(|(ns, kind)| {
                source.namespace_health(ns, *kind, namespace.duration, namespace.query_time)
            })))
            .await?;
        let health: HashMap<(String, HealthKind), NamespaceHealth> =
            requests.iter().cloned().zip(fetched).collect();

        let mut decorated = 0usize;
        for node in traffic.nodes_mut() {
            if !global.is_accessible(&node.namespace) {
                continue;
            }
            // outer None: the node takes no `healthData`
            let mut data: Option<Option<&Health>> = None;
            let mut app_data: Option<&Health> = None;
            for (kind, name) in lookups(node) {
                let found = health
                    .get(&(node.namespace.clone(), kind))
                    .and_then(|h| h.get(name));
                if found.is_none() {
                    trace!(node = %node.id, kind = ?kind, name, "no health reported");
                }
                match (node.node_type, kind) {
                    (NodeType::App, HealthKind::App) if is_ok(&node.workload) => app_data = found,
                    _ => data = Some(found),
                }
            }
            if let Some(found) = data {
                node.metadata.insert(MetadataKey::HealthData, health_record(found));
                decorated += 1;
            }
            if let Some(found) = app_data {
                node.metadata.insert(MetadataKey::HealthDataApp, health_record(Some(found)));
            }
        }
        debug!(namespace = %namespace.name, lookups = requests.len(), decorated, "health applied");
        Ok(())
    }
}
