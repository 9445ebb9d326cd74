//! Request-scoped context shared by the stages of one graph build

use crate::config::GraphConfig;
use crate::source::{
    host_matches, BuildDeadline, MeshConfig, ServiceEntry, SourceResult, SourceSet, Workload,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-namespace context, computed once and read by every appender
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceInfo {
    pub name: String,
    /// Lookback window, never reaching past the namespace's creation
    pub duration: Duration,
    pub query_time: DateTime<Utc>,
}

impl NamespaceInfo {
    pub fn new(
        name: impl Into<String>,
        requested: Duration,
        created_at: Option<DateTime<Utc>>,
        query_time: DateTime<Utc>,
    ) -> Self {
        let duration = match created_at {
            Some(created) if created < query_time => {
                let age = (query_time - created).to_std().unwrap_or(requested);
                requested.min(age)
            }
            Some(_) => Duration::ZERO,
            None => requested,
        };
        Self {
            name: name.into(),
            duration,
            query_time,
        }
    }

    /// Lookback in whole seconds, at least one.
    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs().max(1)
    }
}

/// Service registrations visible across the accessible namespaces
#[derive(Debug, Clone, Default)]
pub struct ExternalServices {
    entries: Vec<ServiceEntry>,
}

impl ExternalServices {
    pub fn new(entries: Vec<ServiceEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `service` in `namespace` resolves to a mesh-external registration.
    pub fn is_external(&self, service: &str, namespace: &str) -> bool {
        self.entries.iter().any(|e| {
            e.is_external()
                && e.is_exported_to(namespace)
                && e.hosts
                    .iter()
                    .any(|h| h == service || host_matches(h, service, &e.namespace))
        })
    }
}

/// Lazily populated handles shared by all appenders of one build.
///
/// Dropped when the build completes.
#[derive(Debug)]
pub struct GlobalInfo {
    pub sources: SourceSet,
    pub config: Arc<GraphConfig>,
    pub deadline: BuildDeadline,
    accessible_namespaces: Vec<String>,
    workloads: HashMap<String, Arc<Vec<Workload>>>,
    mesh_configs: HashMap<String, Arc<MeshConfig>>,
    external: Option<Arc<ExternalServices>>,
}

impl GlobalInfo {
    pub fn new(
        sources: SourceSet,
        config: Arc<GraphConfig>,
        deadline: BuildDeadline,
        accessible_namespaces: Vec<String>,
    ) -> Self {
        Self {
            sources,
            config,
            deadline,
            accessible_namespaces,
            workloads: HashMap::new(),
            mesh_configs: HashMap::new(),
            external: None,
        }
    }

    pub fn accessible_namespaces(&self) -> &[String] {
        &self.accessible_namespaces
    }

    pub fn is_accessible(&self, namespace: &str) -> bool {
        self.accessible_namespaces.iter().any(|n| n == namespace)
    }

    /// Workloads of `namespace`, fetched once per build.
    pub async fn workloads(&mut self, namespace: &str) -> SourceResult<Arc<Vec<Workload>>> {
        if let Some(cached) = self.workloads.get(namespace) {
            return Ok(cached.clone());
        }
        let inventory = self.sources.inventory.clone();
        let fetched = self
            .deadline
            .guard(async { inventory.workloads(namespace).await })
            .await?;
        debug!(namespace, workloads = fetched.len(), "loaded workload inventory");
        let fetched = Arc::new(fetched);
        self.workloads.insert(namespace.to_string(), fetched.clone());
        Ok(fetched)
    }

    /// Mesh configuration of `namespace`, fetched once per build.
    pub async fn mesh_config(&mut self, namespace: &str) -> SourceResult<Arc<MeshConfig>> {
        if let Some(cached) = self.mesh_configs.get(namespace) {
            return Ok(cached.clone());
        }
        let mesh = self.sources.mesh.clone();
        let fetched = Arc::new(
            self.deadline
                .guard(async { mesh.mesh_config(namespace).await })
                .await?,
        );
        self.mesh_configs.insert(namespace.to_string(), fetched.clone());
        Ok(fetched)
    }

    /// Service registrations of every accessible namespace, scanned once per build.
    pub async fn external_services(&mut self) -> SourceResult<Arc<ExternalServices>> {
        if let Some(cached) = &self.external {
            return Ok(cached.clone());
        }
        let directory = self.sources.directory.clone();
        let mut entries = Vec::new();
        for namespace in &self.accessible_namespaces {
            let mut found = self
                .deadline
                .guard(async { directory.service_entries(namespace).await })
                .await?;
            for entry in &mut found {
                if entry.namespace.is_empty() {
                    entry.namespace = namespace.clone();
                }
            }
            entries.extend(found);
        }
        debug!(entries = entries.len(), "loaded external service directory");
        let external = Arc::new(ExternalServices::new(entries));
        self.external = Some(external.clone());
        Ok(external)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ServiceLocation, StaticFixture};
    use chrono::TimeZone;

    #[test]
    fn duration_is_bounded_by_namespace_age() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let created = now - chrono::Duration::seconds(120);
        let info = NamespaceInfo::new("bookinfo", Duration::from_secs(600), Some(created), now);
        assert_eq!(info.duration, Duration::from_secs(120));

        let old = NamespaceInfo::new("bookinfo", Duration::from_secs(600), None, now);
        assert_eq!(old.duration, Duration::from_secs(600));
    }

    #[test]
    fn external_services_respect_location_and_export() {
        let external = ExternalServices::new(vec![
            ServiceEntry {
                name: "ext".into(),
                namespace: "bookinfo".into(),
                hosts: vec!["api.example.com".into()],
                ..Default::default()
            },
            ServiceEntry {
                name: "internal".into(),
                namespace: "bookinfo".into(),
                hosts: vec!["legacy".into()],
                location: ServiceLocation::MeshInternal,
                ..Default::default()
            },
        ]);
        assert!(external.is_external("api.example.com", "bookinfo"));
        assert!(!external.is_external("legacy", "bookinfo"));
    }

    #[tokio::test]
    async fn workloads_are_fetched_once() {
        let fixture = StaticFixture::from_yaml_str(
            "workloads:\n  bookinfo:\n    - name: ratings-v1\n",
        )
        .unwrap();
        let mut global = GlobalInfo::new(
            fixture.into_sources(),
            Arc::new(GraphConfig::default()),
            BuildDeadline::new(),
            vec!["bookinfo".into()],
        );
        let first = global.workloads("bookinfo").await.unwrap();
        let second = global.workloads("bookinfo").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first[0].name, "ratings-v1");
    }
}
