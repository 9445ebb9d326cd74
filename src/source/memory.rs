//! In-memory collaborators
//!
//! Back tests and the demo binary. Metric responses are rules: a rule
//! answers every query whose expression contains all of its fragments.

use super::traits::{
    ExternalServiceDirectory, HealthSource, MeshConfigSource, MetricsClient, SourceError,
    SourceResult, SourceSet, WorkloadInventory,
};
use super::types::{HealthKind, MeshConfig, NamespaceHealth, Sample, ServiceEntry, Workload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

/// Canned samples returned for expressions containing every fragment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricRule {
    pub fragments: Vec<String>,
    pub samples: Vec<Sample>,
}

impl MetricRule {
    pub fn new<'a>(fragments: impl IntoIterator<Item = &'a str>, samples: Vec<Sample>) -> Self {
        Self {
            fragments: fragments.into_iter().map(str::to_string).collect(),
            samples,
        }
    }

    fn matches(&self, expression: &str) -> bool {
        self.fragments.iter().all(|f| expression.contains(f.as_str()))
    }
}

/// Metrics client answering from a fixed rule list
#[derive(Debug, Default)]
pub struct StaticMetrics {
    rules: Vec<MetricRule>,
    log: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl StaticMetrics {
    pub fn new(rules: Vec<MetricRule>) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn with_rule(mut self, rule: MetricRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Make every subsequent query fail.
    pub fn fail_queries(&self) {
        self.failing.store(true, Ordering::Relaxed);
    }

    /// Expressions received so far.
    pub fn queries(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MetricsClient for StaticMetrics {
    async fn query(&self, expression: &str, _instant: DateTime<Utc>) -> SourceResult<Vec<Sample>> {
        if let Ok(mut log) = self.log.lock() {
            log.push(expression.to_string());
        }
        if self.failing.load(Ordering::Relaxed) {
            return Err(SourceError::Query(format!("backend unavailable: {expression}")));
        }
        let samples: Vec<Sample> = self
            .rules
            .iter()
            .filter(|r| r.matches(expression))
            .flat_map(|r| r.samples.iter().cloned())
            .collect();
        trace!(expression, samples = samples.len(), "static metrics query");
        Ok(samples)
    }
}

/// Mesh configuration, inventory, service registrations and health keyed by
/// namespace
#[derive(Debug, Default)]
pub struct StaticMesh {
    configs: DashMap<String, MeshConfig>,
    workloads: DashMap<String, Vec<Workload>>,
    entries: DashMap<String, Vec<ServiceEntry>>,
    health: DashMap<(String, HealthKind), NamespaceHealth>,
}

impl StaticMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(self, namespace: impl Into<String>, config: MeshConfig) -> Self {
        self.configs.insert(namespace.into(), config);
        self
    }

    pub fn with_workloads(self, namespace: impl Into<String>, workloads: Vec<Workload>) -> Self {
        self.workloads.insert(namespace.into(), workloads);
        self
    }

    pub fn with_service_entries(self, namespace: impl Into<String>, mut entries: Vec<ServiceEntry>) -> Self {
        let namespace = namespace.into();
        for entry in &mut entries {
            if entry.namespace.is_empty() {
                entry.namespace = namespace.clone();
            }
        }
        self.entries.insert(namespace, entries);
        self
    }

    pub fn with_health(self, namespace: impl Into<String>, kind: HealthKind, health: NamespaceHealth) -> Self {
        self.health.insert((namespace.into(), kind), health);
        self
    }
}

#[async_trait]
impl MeshConfigSource for StaticMesh {
    async fn mesh_config(&self, namespace: &str) -> SourceResult<MeshConfig> {
        Ok(self
            .configs
            .get(namespace)
            .map(|c| c.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl WorkloadInventory for StaticMesh {
    async fn workloads(&self, namespace: &str) -> SourceResult<Vec<Workload>> {
        Ok(self
            .workloads
            .get(namespace)
            .map(|w| w.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExternalServiceDirectory for StaticMesh {
    async fn service_entries(&self, namespace: &str) -> SourceResult<Vec<ServiceEntry>> {
        Ok(self
            .entries
            .get(namespace)
            .map(|e| e.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl HealthSource for StaticMesh {
    async fn namespace_health(
        &self,
        namespace: &str,
        kind: HealthKind,
        _window: Duration,
        _instant: DateTime<Utc>,
    ) -> SourceResult<NamespaceHealth> {
        Ok(self
            .health
            .get(&(namespace.to_string(), kind))
            .map(|h| h.clone())
            .unwrap_or_default())
    }
}

/// Health of one namespace, per entity kind
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealthFixture {
    pub apps: NamespaceHealth,
    pub services: NamespaceHealth,
    pub workloads: NamespaceHealth,
}

/// Everything needed to serve a build from memory, loadable from YAML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticFixture {
    pub workloads: HashMap<String, Vec<Workload>>,
    pub mesh: HashMap<String, MeshConfig>,
    pub service_entries: HashMap<String, Vec<ServiceEntry>>,
    pub metrics: Vec<MetricRule>,
    pub health: HashMap<String, HealthFixture>,
}

impl StaticFixture {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn into_sources(self) -> SourceSet {
        let mut mesh = StaticMesh::new();
        for (ns, config) in self.mesh {
            mesh = mesh.with_config(ns, config);
        }
        for (ns, workloads) in self.workloads {
            mesh = mesh.with_workloads(ns, workloads);
        }
        for (ns, entries) in self.service_entries {
            mesh = mesh.with_service_entries(ns, entries);
        }
        for (ns, health) in self.health {
            mesh = mesh
                .with_health(ns.clone(), HealthKind::App, health.apps)
                .with_health(ns.clone(), HealthKind::Service, health.services)
                .with_health(ns, HealthKind::Workload, health.workloads);
        }
        let mesh = Arc::new(mesh);
        SourceSet::new(
            Arc::new(StaticMetrics::new(self.metrics)),
            mesh.clone(),
            mesh.clone(),
            mesh.clone(),
        )
        .with_health(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::HealthStatus;

    #[tokio::test]
    async fn rules_match_on_all_fragments() {
        let metrics = StaticMetrics::new(vec![MetricRule::new(
            ["istio_requests_total", "reporter=\"source\""],
            vec![Sample::new([("a", "b")], 1.0)],
        )]);
        let hit = metrics
            .query("sum(rate(istio_requests_total{reporter=\"source\"}[60s]))", Utc::now())
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);
        let miss = metrics
            .query("sum(rate(istio_requests_total{reporter=\"destination\"}[60s]))", Utc::now())
            .await
            .unwrap();
        assert!(miss.is_empty());
        assert_eq!(metrics.queries().len(), 2);
    }

    #[tokio::test]
    async fn failing_metrics_report_query_error() {
        let metrics = StaticMetrics::default();
        metrics.fail_queries();
        let result = metrics.query("up", Utc::now()).await;
        assert!(matches!(result, Err(SourceError::Query(_))));
    }

    #[tokio::test]
    async fn unknown_namespace_is_empty() {
        let mesh = StaticMesh::new();
        assert!(mesh.workloads("nowhere").await.unwrap().is_empty());
        assert_eq!(mesh.mesh_config("nowhere").await.unwrap(), MeshConfig::default());
    }

    #[test]
    fn fixture_loads_from_yaml() {
        let yaml = r#"
workloads:
  bookinfo:
    - name: ratings-v1
      labels: { app: ratings, version: v1 }
      pods:
        - { name: ratings-v1-abc, has_sidecar: true }
service_entries:
  bookinfo:
    - name: external-api
      hosts: [api.example.com]
metrics:
  - fragments: [istio_requests_total]
    samples:
      - labels: { source_workload: productpage-v1 }
        value: 2.5
health:
  bookinfo:
    workloads:
      ratings-v1: { status: degraded, available_replicas: 1, desired_replicas: 2 }
"#;
        let fixture = StaticFixture::from_yaml_str(yaml).unwrap();
        assert_eq!(fixture.workloads["bookinfo"][0].pod_count(), 1);
        assert_eq!(fixture.metrics[0].samples[0].value, 2.5);
        assert_eq!(fixture.service_entries["bookinfo"][0].hosts[0], "api.example.com");
        let ratings = &fixture.health["bookinfo"].workloads["ratings-v1"];
        assert_eq!(ratings.status, HealthStatus::Degraded);
        assert_eq!(ratings.desired_replicas, Some(2));
    }

    #[tokio::test]
    async fn fixture_health_is_served_per_kind() {
        let sources = StaticFixture::from_yaml_str(
            r#"
health:
  bookinfo:
    services:
      reviews: { status: healthy, error_ratio: 0.0 }
"#,
        )
        .unwrap()
        .into_sources();
        let window = Duration::from_secs(600);
        let services = sources
            .health
            .namespace_health("bookinfo", HealthKind::Service, window, Utc::now())
            .await
            .unwrap();
        assert_eq!(services["reviews"].status, HealthStatus::Healthy);
        let apps = sources
            .health
            .namespace_health("bookinfo", HealthKind::App, window, Utc::now())
            .await
            .unwrap();
        assert!(apps.is_empty());
    }
}
