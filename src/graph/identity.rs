//! Node identity: graph granularity and the deterministic ID scheme
//!
//! Every component that needs to find a node in the traffic map rebuilds
//! its ID from a [`NodeIdentity`] instead of looking it up by name. The
//! resolution rules are therefore the single source of truth for how label
//! sets collapse into graph nodes.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Reserved value for identity fields that could not be resolved.
pub const UNKNOWN: &str = "unknown";

/// A name is usable when it is present and not the `unknown` sentinel.
pub fn is_ok(name: &str) -> bool {
    !name.is_empty() && name != UNKNOWN
}

/// Versions additionally reject the `latest` placeholder.
pub fn is_ok_version(version: &str) -> bool {
    is_ok(version) && version != "latest"
}

/// The level at which traffic is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphType {
    App,
    Service,
    #[default]
    VersionedApp,
    Workload,
}

impl GraphType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphType::App => "app",
            GraphType::Service => "service",
            GraphType::VersionedApp => "versionedApp",
            GraphType::Workload => "workload",
        }
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(GraphType::App),
            "service" => Ok(GraphType::Service),
            "versionedApp" => Ok(GraphType::VersionedApp),
            "workload" => Ok(GraphType::Workload),
            other => Err(format!("unknown graph type: {other}")),
        }
    }
}

/// Kind of entity a node represents.
///
/// A versioned-app node is an [`NodeType::App`] node that carries a version.
/// Aggregate nodes classify the requests reaching a destination by one
/// telemetry label and are never produced by identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Aggregate,
    App,
    Service,
    Unknown,
    Workload,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Aggregate => "aggregate",
            NodeType::App => "app",
            NodeType::Service => "service",
            NodeType::Unknown => "unknown",
            NodeType::Workload => "workload",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier for a node in a traffic map
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Raw identity fields as reported by telemetry or inventory.
///
/// Fields may hold the [`UNKNOWN`] sentinel or be empty; resolution decides
/// which of them participate in the ID for a given [`GraphType`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeIdentity {
    pub cluster: String,
    pub service_namespace: String,
    pub service: String,
    pub workload_namespace: String,
    pub workload: String,
    pub app: String,
    pub version: String,
}

/// Escape an ID component so that `_`-joined components stay unambiguous.
///
/// Names without `_` or `%` are returned unchanged.
fn part(name: &str) -> Cow<'_, str> {
    if name.contains(['_', '%']) {
        Cow::Owned(name.replace('%', "%25").replace('_', "%5F"))
    } else {
        Cow::Borrowed(name)
    }
}

/// ID of the node grouping requests whose `aggregate` label equals `value`,
/// scoped to `service` when one is given.
pub fn aggregate_id(cluster: &str, namespace: &str, aggregate: &str, value: &str, service: &str) -> NodeId {
    let mut id = format!(
        "agg_{}_{}_{}_{}",
        part(cluster),
        part(namespace),
        part(aggregate),
        part(value)
    );
    if !service.is_empty() {
        id.push('_');
        id.push_str(&part(service));
    }
    NodeId(id)
}

/// Outcome of identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    pub id: NodeId,
    pub node_type: NodeType,
    pub namespace: String,
}

impl NodeIdentity {
    /// Identity of a workload as seen from inventory.
    pub fn workload(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        workload: impl Into<String>,
        app: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            workload_namespace: namespace.into(),
            workload: workload.into(),
            app: app.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Identity of a service with no resolved backing workload.
    pub fn service(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            service_namespace: namespace.into(),
            service: service.into(),
            ..Default::default()
        }
    }

    /// The reserved identity for traffic with no known origin.
    pub fn unknown_source(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            workload_namespace: UNKNOWN.to_string(),
            workload: UNKNOWN.to_string(),
            app: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            ..Default::default()
        }
    }

    /// Namespace the node is filed under: the workload's when usable,
    /// otherwise the service's.
    pub fn namespace(&self) -> &str {
        if is_ok(&self.workload_namespace) || self.service_namespace.is_empty() {
            &self.workload_namespace
        } else {
            &self.service_namespace
        }
    }

    /// Resolve the node ID and kind for this identity under `graph_type`.
    ///
    /// Total: identities that cannot be attributed to any entity resolve to
    /// the per-namespace unknown service.
    pub fn resolve(&self, graph_type: GraphType) -> ResolvedId {
        let cluster = part(&self.cluster);
        let namespace = self.namespace().to_string();

        if namespace == UNKNOWN
            && self.workload == UNKNOWN
            && self.app == UNKNOWN
            && self.service.is_empty()
        {
            return ResolvedId {
                id: NodeId(format!("{cluster}_unknown_source")),
                node_type: NodeType::Unknown,
                namespace,
            };
        }

        let workload_ok = is_ok(&self.workload);
        let app_ok = is_ok(&self.app);
        let service_ok = is_ok(&self.service);

        let unknown_service = || ResolvedId {
            id: NodeId(format!("svc_{cluster}_{}_unknown", part(&namespace))),
            node_type: NodeType::Service,
            namespace: namespace.clone(),
        };
        let service_node = || ResolvedId {
            id: NodeId(format!(
                "svc_{cluster}_{}_{}",
                part(&self.service_namespace),
                part(&self.service)
            )),
            node_type: NodeType::Service,
            namespace: self.service_namespace.clone(),
        };
        let workload_node = || ResolvedId {
            id: NodeId(format!(
                "wl_{cluster}_{}_{}",
                part(&self.workload_namespace),
                part(&self.workload)
            )),
            node_type: NodeType::Workload,
            namespace: self.workload_namespace.clone(),
        };

        if !workload_ok && !app_ok && !service_ok {
            return unknown_service();
        }

        match graph_type {
            // service graphs are built as workload graphs and reduced later
            GraphType::Workload | GraphType::Service => {
                if workload_ok {
                    workload_node()
                } else if service_ok {
                    service_node()
                } else {
                    unknown_service()
                }
            }
            GraphType::App | GraphType::VersionedApp => {
                if app_ok {
                    let ns = part(&self.workload_namespace);
                    let app = part(&self.app);
                    // a known workload pins its own app and version labels
                    let id = match graph_type {
                        GraphType::VersionedApp if workload_ok => {
                            format!("vapp_{cluster}_{ns}_{}", part(&self.workload))
                        }
                        GraphType::VersionedApp if is_ok_version(&self.version) => {
                            format!("vapp_{cluster}_{ns}_{app}_{}", part(&self.version))
                        }
                        _ => format!("app_{cluster}_{ns}_{app}"),
                    };
                    ResolvedId {
                        id: NodeId(id),
                        node_type: NodeType::App,
                        namespace: self.workload_namespace.clone(),
                    }
                } else if workload_ok {
                    workload_node()
                } else {
                    service_node()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn productpage() -> NodeIdentity {
        NodeIdentity::workload("east", "bookinfo", "productpage-v1", "productpage", "v1")
    }

    #[test]
    fn unknown_source_has_reserved_id() {
        let resolved = NodeIdentity::unknown_source("east").resolve(GraphType::VersionedApp);
        assert_eq!(resolved.id.as_str(), "east_unknown_source");
        assert_eq!(resolved.node_type, NodeType::Unknown);
    }

    #[test]
    fn versioned_app_is_keyed_by_workload() {
        let resolved = productpage().resolve(GraphType::VersionedApp);
        assert_eq!(resolved.id.as_str(), "vapp_east_bookinfo_productpage-v1");
        assert_eq!(resolved.node_type, NodeType::App);
    }

    #[test]
    fn versioned_app_without_workload_uses_app_and_version() {
        let mut identity = productpage();
        identity.workload = UNKNOWN.to_string();
        let resolved = identity.resolve(GraphType::VersionedApp);
        assert_eq!(resolved.id.as_str(), "vapp_east_bookinfo_productpage_v1");
    }

    #[test]
    fn underscores_in_names_do_not_collide() {
        let mut a = productpage();
        a.workload = UNKNOWN.to_string();
        a.app = "foo_bar".to_string();
        a.version = "v1".to_string();
        let mut b = a.clone();
        b.app = "foo".to_string();
        b.version = "bar_v1".to_string();
        let (a, b) = (a.resolve(GraphType::VersionedApp), b.resolve(GraphType::VersionedApp));
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.as_str(), "vapp_east_bookinfo_foo%5Fbar_v1");
    }

    #[test]
    fn app_graph_drops_version() {
        let resolved = productpage().resolve(GraphType::App);
        assert_eq!(resolved.id.as_str(), "app_east_bookinfo_productpage");
    }

    #[test]
    fn latest_version_without_workload_collapses_to_app() {
        let mut identity = productpage();
        identity.version = "latest".to_string();
        identity.workload = UNKNOWN.to_string();
        let resolved = identity.resolve(GraphType::VersionedApp);
        assert_eq!(resolved.id.as_str(), "app_east_bookinfo_productpage");
    }

    #[test]
    fn workload_graph_uses_workload_name() {
        let resolved = productpage().resolve(GraphType::Workload);
        assert_eq!(resolved.id.as_str(), "wl_east_bookinfo_productpage-v1");
        assert_eq!(resolved.node_type, NodeType::Workload);
    }

    #[test]
    fn service_identity_resolves_to_service_node() {
        let identity = NodeIdentity::service("east", "bookinfo", "reviews");
        for graph_type in [GraphType::App, GraphType::Workload, GraphType::Service] {
            let resolved = identity.resolve(graph_type);
            assert_eq!(resolved.id.as_str(), "svc_east_bookinfo_reviews");
            assert_eq!(resolved.node_type, NodeType::Service);
        }
    }

    #[test]
    fn unattributable_identity_falls_back_to_unknown_service() {
        let identity = NodeIdentity {
            cluster: "east".into(),
            service_namespace: "bookinfo".into(),
            service: UNKNOWN.into(),
            workload: UNKNOWN.into(),
            app: UNKNOWN.into(),
            ..Default::default()
        };
        let resolved = identity.resolve(GraphType::VersionedApp);
        assert_eq!(resolved.id.as_str(), "svc_east_bookinfo_unknown");
        assert_eq!(resolved.node_type, NodeType::Service);
    }

    #[test]
    fn graph_type_parses_round_trip() {
        for graph_type in [
            GraphType::App,
            GraphType::Service,
            GraphType::VersionedApp,
            GraphType::Workload,
        ] {
            assert_eq!(graph_type.as_str().parse::<GraphType>(), Ok(graph_type));
        }
        assert!("bogus".parse::<GraphType>().is_err());
    }
}
