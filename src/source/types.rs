//! Data shapes returned by collaborators

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Labels attached to a metric sample
pub type LabelSet = BTreeMap<String, String>;

/// One labeled value of an instant vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub labels: LabelSet,
    pub value: f64,
}

impl Sample {
    pub fn new<'a>(labels: impl IntoIterator<Item = (&'a str, &'a str)>, value: f64) -> Self {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// A running pod of a workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pod {
    pub name: String,
    pub has_sidecar: bool,
}

/// A deployable unit from the workload inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workload {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub pods: Vec<Pod>,
}

impl Workload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_pod(mut self, name: impl Into<String>, has_sidecar: bool) -> Self {
        self.pods.push(Pod {
            name: name.into(),
            has_sidecar,
        });
        self
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }
}

/// Entity kind a health lookup covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthKind {
    App,
    Service,
    Workload,
}

/// Overall state of an app, service or workload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failure,
    NotReady,
    #[default]
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Failure => "Failure",
            HealthStatus::NotReady => "Not Ready",
            HealthStatus::Unknown => "NA",
        }
    }
}

/// Health of one entity over the lookback window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Health {
    pub status: HealthStatus,
    pub available_replicas: Option<u32>,
    pub desired_replicas: Option<u32>,
    /// Fraction of inbound requests that failed
    pub error_ratio: Option<f64>,
}

/// Health of every entity of one kind in a namespace, keyed by name
pub type NamespaceHealth = BTreeMap<String, Health>;

/// TLS mode of a destination rule's client settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TlsMode {
    Disable,
    Simple,
    Mutual,
    IstioMutual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsSettings {
    pub mode: TlsMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPool {
    pub max_connections: Option<u32>,
    pub http1_max_pending_requests: Option<u32>,
    pub max_requests_per_connection: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierDetection {
    pub consecutive_errors: Option<u32>,
    pub interval: Option<String>,
    pub base_ejection_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficPolicy {
    pub connection_pool: Option<ConnectionPool>,
    pub outlier_detection: Option<OutlierDetection>,
    pub tls: Option<TlsSettings>,
}

impl TrafficPolicy {
    /// A policy configures a circuit breaker when it limits connections or
    /// ejects outliers.
    pub fn is_circuit_breaker(&self) -> bool {
        self.connection_pool.is_some() || self.outlier_detection.is_some()
    }

    pub fn is_mutual_tls(&self) -> bool {
        matches!(
            self.tls.as_ref().map(|t| t.mode),
            Some(TlsMode::IstioMutual) | Some(TlsMode::Mutual)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subset {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub traffic_policy: Option<TrafficPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationRule {
    pub name: String,
    pub host: String,
    pub traffic_policy: Option<TrafficPolicy>,
    pub subsets: Vec<Subset>,
}

/// Whether `host` addresses `service` in `namespace`.
///
/// Accepts the short name, `service.namespace`, the `.svc` forms with any
/// cluster domain suffix, and the `*` wildcard.
pub fn host_matches(host: &str, service: &str, namespace: &str) -> bool {
    if host == "*" || host == service {
        return true;
    }
    let parts: Vec<&str> = host.split('.').collect();
    match parts.as_slice() {
        [svc, ns] => *svc == service && *ns == namespace,
        [svc, ns, "svc", ..] => *svc == service && *ns == namespace,
        _ => false,
    }
}

impl DestinationRule {
    fn matching_subsets<'a>(
        &'a self,
        version: &'a str,
        version_label: &'a str,
    ) -> impl Iterator<Item = &'a Subset> + 'a {
        self.subsets.iter().filter(move |s| {
            version.is_empty() || s.labels.get(version_label).map(String::as_str) == Some(version)
        })
    }

    /// Whether the rule configures a circuit breaker for `service`, or for
    /// its `version` subset when a version is given.
    pub fn has_circuit_breaker(
        &self,
        namespace: &str,
        service: &str,
        version: &str,
        version_label: &str,
    ) -> bool {
        if !host_matches(&self.host, service, namespace) {
            return false;
        }
        if self
            .traffic_policy
            .as_ref()
            .is_some_and(TrafficPolicy::is_circuit_breaker)
        {
            return true;
        }
        self.matching_subsets(version, version_label).any(|s| {
            s.traffic_policy
                .as_ref()
                .is_some_and(TrafficPolicy::is_circuit_breaker)
        })
    }

    /// Whether the rule requires mutual TLS toward `service` (or `version`).
    pub fn has_mutual_tls(
        &self,
        namespace: &str,
        service: &str,
        version: &str,
        version_label: &str,
    ) -> bool {
        if !host_matches(&self.host, service, namespace) {
            return false;
        }
        if self
            .traffic_policy
            .as_ref()
            .is_some_and(TrafficPolicy::is_mutual_tls)
        {
            return true;
        }
        self.matching_subsets(version, version_label).any(|s| {
            s.traffic_policy
                .as_ref()
                .is_some_and(TrafficPolicy::is_mutual_tls)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteDestination {
    pub host: String,
    pub subset: Option<String>,
    pub weight: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRoute {
    #[serde(rename = "match")]
    pub matches: Vec<serde_json::Value>,
    pub route: Vec<RouteDestination>,
    pub fault: Option<serde_json::Value>,
    pub mirror: Option<serde_json::Value>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualService {
    pub name: String,
    pub hosts: Vec<String>,
    pub http: Vec<HttpRoute>,
}

impl VirtualService {
    pub fn applies_to(&self, service: &str, namespace: &str) -> bool {
        self.hosts.iter().any(|h| host_matches(h, service, namespace))
    }

    /// Routes select traffic by match conditions or pin it to subsets.
    pub fn has_request_routing(&self) -> bool {
        self.http.iter().any(|r| {
            !r.matches.is_empty() || r.route.iter().any(|d| d.subset.is_some())
        })
    }

    pub fn has_traffic_shifting(&self) -> bool {
        self.http
            .iter()
            .any(|r| r.route.iter().filter(|d| d.weight.is_some()).count() > 1)
    }

    pub fn has_fault_injection(&self) -> bool {
        self.http.iter().any(|r| r.fault.is_some())
    }

    pub fn has_request_timeout(&self) -> bool {
        self.http.iter().any(|r| r.timeout.is_some())
    }

    pub fn has_mirroring(&self) -> bool {
        self.http.iter().any(|r| r.mirror.is_some())
    }
}

/// Where a registered service lives relative to the mesh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceLocation {
    #[default]
    MeshExternal,
    MeshInternal,
}

/// A service registration from the external-service directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEntry {
    pub name: String,
    pub namespace: String,
    pub hosts: Vec<String>,
    pub location: ServiceLocation,
    pub export_to: Vec<String>,
}

impl ServiceEntry {
    /// Whether the entry is visible from `namespace`.
    pub fn is_exported_to(&self, namespace: &str) -> bool {
        self.namespace == namespace
            || self.export_to.is_empty()
            || self.export_to.iter().any(|e| e == "*" || e == namespace)
    }

    pub fn is_external(&self) -> bool {
        self.location == ServiceLocation::MeshExternal
    }
}

/// Mesh configuration of one namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub destination_rules: Vec<DestinationRule>,
    pub virtual_services: Vec<VirtualService>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings_rule() -> DestinationRule {
        DestinationRule {
            name: "ratings".into(),
            host: "ratings".into(),
            traffic_policy: None,
            subsets: vec![
                Subset {
                    name: "v1".into(),
                    labels: [("version".to_string(), "v1".to_string())].into(),
                    traffic_policy: Some(TrafficPolicy {
                        outlier_detection: Some(OutlierDetection::default()),
                        ..Default::default()
                    }),
                },
                Subset {
                    name: "v2".into(),
                    labels: [("version".to_string(), "v2".to_string())].into(),
                    traffic_policy: None,
                },
            ],
        }
    }

    #[test]
    fn host_matching_forms() {
        assert!(host_matches("ratings", "ratings", "bookinfo"));
        assert!(host_matches("ratings.bookinfo", "ratings", "bookinfo"));
        assert!(host_matches("ratings.bookinfo.svc", "ratings", "bookinfo"));
        assert!(host_matches("ratings.bookinfo.svc.cluster.local", "ratings", "bookinfo"));
        assert!(host_matches("*", "ratings", "bookinfo"));
        assert!(!host_matches("ratings.other", "ratings", "bookinfo"));
        assert!(!host_matches("reviews", "ratings", "bookinfo"));
    }

    #[test]
    fn subset_circuit_breaker_applies_to_its_version_only() {
        let rule = ratings_rule();
        assert!(rule.has_circuit_breaker("bookinfo", "ratings", "v1", "version"));
        assert!(!rule.has_circuit_breaker("bookinfo", "ratings", "v2", "version"));
        // service level: any subset counts
        assert!(rule.has_circuit_breaker("bookinfo", "ratings", "", "version"));
        assert!(!rule.has_circuit_breaker("bookinfo", "reviews", "", "version"));
    }

    #[test]
    fn virtual_service_flags() {
        let vs = VirtualService {
            name: "reviews".into(),
            hosts: vec!["reviews".into()],
            http: vec![HttpRoute {
                route: vec![
                    RouteDestination {
                        host: "reviews".into(),
                        subset: Some("v1".into()),
                        weight: Some(50),
                    },
                    RouteDestination {
                        host: "reviews".into(),
                        subset: Some("v2".into()),
                        weight: Some(50),
                    },
                ],
                ..Default::default()
            }],
        };
        assert!(vs.applies_to("reviews", "bookinfo"));
        assert!(vs.has_request_routing());
        assert!(vs.has_traffic_shifting());
        assert!(!vs.has_fault_injection());
    }

    #[test]
    fn service_entry_export_scope() {
        let entry = ServiceEntry {
            name: "ext".into(),
            namespace: "bookinfo".into(),
            hosts: vec!["api.example.com".into()],
            export_to: vec![".".into()],
            ..Default::default()
        };
        assert!(entry.is_exported_to("bookinfo"));
        assert!(!entry.is_exported_to("other"));
        assert!(entry.is_external());
    }
}
