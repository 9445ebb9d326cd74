//! External collaborators: metrics backend, mesh configuration, workload
//! inventory, the service directory and health
//!
//! Only the query/response contracts live here. In-memory implementations
//! are provided in [`memory`].

mod deadline;
pub mod memory;
mod traits;
mod types;

pub use deadline::BuildDeadline;
pub use memory::{HealthFixture, MetricRule, StaticFixture, StaticMesh, StaticMetrics};
pub use traits::{
    ExternalServiceDirectory, HealthSource, MeshConfigSource, MetricsClient, NoHealth,
    SourceError, SourceResult, SourceSet, WorkloadInventory,
};
pub use types::{
    host_matches, ConnectionPool, DestinationRule, Health, HealthKind, HealthStatus, HttpRoute,
    LabelSet, MeshConfig, NamespaceHealth, OutlierDetection, Pod, RouteDestination, Sample,
    ServiceEntry, ServiceLocation, Subset, TlsMode, TlsSettings, TrafficPolicy, VirtualService,
    Workload,
};
