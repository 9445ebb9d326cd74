//! Collaborator contracts consumed by the graph build

use super::types::{HealthKind, MeshConfig, NamespaceHealth, Sample, ServiceEntry, Workload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by external collaborators
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("metrics query failed: {0}")]
    Query(String),

    #[error("mesh config unavailable for namespace {namespace}: {reason}")]
    MeshConfig { namespace: String, reason: String },

    #[error("workload inventory unavailable for namespace {namespace}: {reason}")]
    Inventory { namespace: String, reason: String },

    #[error("external service directory unavailable for namespace {namespace}: {reason}")]
    Directory { namespace: String, reason: String },

    #[error("health unavailable for namespace {namespace}: {reason}")]
    Health { namespace: String, reason: String },

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("build cancelled")]
    Cancelled,
}

/// Result type for collaborator calls
pub type SourceResult<T> = Result<T, SourceError>;

/// Instant-vector query against the metrics backend.
#[async_trait]
pub trait MetricsClient: Send + Sync {
    async fn query(&self, expression: &str, instant: DateTime<Utc>) -> SourceResult<Vec<Sample>>;
}

/// Routing, resilience and security objects of one namespace.
#[async_trait]
pub trait MeshConfigSource: Send + Sync {
    async fn mesh_config(&self, namespace: &str) -> SourceResult<MeshConfig>;
}

/// Workloads of one namespace, with labels and pod state.
#[async_trait]
pub trait WorkloadInventory: Send + Sync {
    async fn workloads(&self, namespace: &str) -> SourceResult<Vec<Workload>>;
}

/// Service registrations of one namespace.
#[async_trait]
pub trait ExternalServiceDirectory: Send + Sync {
    async fn service_entries(&self, namespace: &str) -> SourceResult<Vec<ServiceEntry>>;
}

/// Health of the apps, services or workloads of one namespace.
#[async_trait]
pub trait HealthSource: Send + Sync {
    async fn namespace_health(
        &self,
        namespace: &str,
        kind: HealthKind,
        window: Duration,
        instant: DateTime<Utc>,
    ) -> SourceResult<NamespaceHealth>;
}

/// Health source that knows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHealth;

#[async_trait]
impl HealthSource for NoHealth {
    async fn namespace_health(
        &self,
        _namespace: &str,
        _kind: HealthKind,
        _window: Duration,
        _instant: DateTime<Utc>,
    ) -> SourceResult<NamespaceHealth> {
        Ok(NamespaceHealth::new())
    }
}

/// Handles to every collaborator a build consults.
#[derive(Clone)]
pub struct SourceSet {
    pub metrics: Arc<dyn MetricsClient>,
    pub mesh: Arc<dyn MeshConfigSource>,
    pub inventory: Arc<dyn WorkloadInventory>,
    pub directory: Arc<dyn ExternalServiceDirectory>,
    pub health: Arc<dyn HealthSource>,
}

impl SourceSet {
    pub fn new(
        metrics: Arc<dyn MetricsClient>,
        mesh: Arc<dyn MeshConfigSource>,
        inventory: Arc<dyn WorkloadInventory>,
        directory: Arc<dyn ExternalServiceDirectory>,
    ) -> Self {
        Self {
            metrics,
            mesh,
            inventory,
            directory,
            health: Arc::new(NoHealth),
        }
    }

    pub fn with_health(mut self, health: Arc<dyn HealthSource>) -> Self {
        self.health = health;
        self
    }
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSet").finish_non_exhaustive()
    }
}
