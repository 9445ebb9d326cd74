//! Mesh configuration flags: circuit breakers, routing rules and mutual TLS
//!
//! Only nodes of the namespace being processed are considered. Destination
//! rules badge service and app nodes; virtual services badge service nodes.
//! Each category is evaluated independently and the first applicable object
//! wins.

use super::traits::{Appender, AppenderResult};
use crate::graph::{is_ok, is_ok_version, GlobalInfo, MetadataKey, MetadataResult, NamespaceInfo, Node, NodeType, TrafficMap};
use crate::source::MeshConfig;
use async_trait::async_trait;
use tracing::debug;

pub const NAME: &str = "istio";

/// A service a node may be addressed by, with the version subset to check
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    namespace: String,
    service: String,
    version: String,
}

/// Services whose destination rules apply to `node`.
///
/// Service nodes are addressed by their own name. App nodes, versioned or
/// not, by the services they were reached through. Workload nodes are not
/// badged.
fn service_candidates(node: &Node) -> MetadataResult<Vec<Candidate>> {
    let version = if is_ok_version(&node.version) { node.version.as_str() } else { "" };
    let mut out: Vec<Candidate> = Vec::new();
    match node.node_type {
        NodeType::Service if is_ok(&node.service) => out.push(Candidate {
            namespace: node.namespace.clone(),
            service: node.service.clone(),
            version: String::new(),
        }),
        NodeType::App => {
            for (service, namespace) in node.dest_service_refs()? {
                let candidate = Candidate {
                    namespace,
                    service,
                    version: version.to_string(),
                };
                if !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        }
        NodeType::Aggregate | NodeType::Service | NodeType::Workload | NodeType::Unknown => {}
    }
    Ok(out)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Flagged {
    circuit_breakers: usize,
    virtual_services: usize,
    mtls: usize,
}

fn apply(node: &mut Node, config: &MeshConfig, version_label: &str, flagged: &mut Flagged) -> MetadataResult<()> {
    let candidates = service_candidates(node)?;

    let has_cb = config.destination_rules.iter().any(|dr| {
        candidates
            .iter()
            .any(|c| dr.has_circuit_breaker(&c.namespace, &c.service, &c.version, version_label))
    });
    if has_cb {
        node.metadata.set_flag(MetadataKey::HasCircuitBreaker);
        flagged.circuit_breakers += 1;
    }

    let has_mtls = config.destination_rules.iter().any(|dr| {
        candidates
            .iter()
            .any(|c| dr.has_mutual_tls(&c.namespace, &c.service, &c.version, version_label))
    });
    if has_mtls {
        node.metadata.set_flag(MetadataKey::HasMtls);
        flagged.mtls += 1;
    }

    // routing rules are bound to hosts, so only service nodes carry them
    if node.node_type != NodeType::Service || !is_ok(&node.service) {
        return Ok(());
    }
    let vs = config
        .virtual_services
        .iter()
        .find(|vs| vs.applies_to(&node.service, &node.namespace));
    if let Some(vs) = vs {
        node.metadata
            .insert(MetadataKey::HasVirtualService, vs.hosts.join(","));
        let flags = [
            (MetadataKey::HasRequestRouting, vs.has_request_routing()),
            (MetadataKey::HasTrafficShifting, vs.has_traffic_shifting()),
            (MetadataKey::HasFaultInjection, vs.has_fault_injection()),
            (MetadataKey::HasRequestTimeout, vs.has_request_timeout()),
            (MetadataKey::HasMirroring, vs.has_mirroring()),
        ];
        for (key, set) in flags {
            if set {
                node.metadata.set_flag(key);
            }
        }
        flagged.virtual_services += 1;
    }
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct MeshConfigAppender;

impl MeshConfigAppender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Appender for MeshConfigAppender {
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
        let config = global.mesh_config(&namespace.name).await?;
        if config.destination_rules.is_empty() && config.virtual_services.is_empty() {
            return Ok(());
        }
        let version_label = global.config.version_label.clone();

        let mut flagged = Flagged::default();
        for node in traffic.nodes_mut() {
            if node.namespace != namespace.name {
                continue;
            }
            apply(node, &config, &version_label, &mut flagged)?;
        }
        debug!(
            namespace = %namespace.name,
            circuit_breakers = flagged.circuit_breakers,
            virtual_services = flagged.virtual_services,
            mtls = flagged.mtls,
            "mesh config flags applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphType, NodeIdentity};

    fn candidate(service: &str, version: &str) -> Candidate {
        Candidate {
            namespace: "bookinfo".into(),
            service: service.into(),
            version: version.into(),
        }
    }

    #[test]
    fn versioned_node_candidates_are_its_dest_services() {
        let mut node = Node::new(
            &NodeIdentity::workload("east", "bookinfo", "ratings-v1", "ratings", "v1"),
            GraphType::VersionedApp,
        );
        node.add_dest_service("bookinfo", "ratings").unwrap();
        node.add_dest_service("bookinfo", "ratings-canary").unwrap();
        assert_eq!(
            service_candidates(&node).unwrap(),
            vec![candidate("ratings", "v1"), candidate("ratings-canary", "v1")]
        );
    }

    #[test]
    fn unversioned_app_checks_services_without_subset() {
        let mut node = Node::new(
            &NodeIdentity::workload("east", "bookinfo", "ratings-v1", "ratings", "v1"),
            GraphType::App,
        );
        assert!(service_candidates(&node).unwrap().is_empty());
        node.add_dest_service("bookinfo", "ratings").unwrap();
        assert_eq!(service_candidates(&node).unwrap(), vec![candidate("ratings", "")]);
    }

    #[test]
    fn workload_and_unknown_nodes_have_no_candidates() {
        let mut workload = Node::new(
            &NodeIdentity::workload("east", "bookinfo", "ratings-v1", "ratings", "v1"),
            GraphType::Workload,
        );
        workload.add_dest_service("bookinfo", "ratings").unwrap();
        assert!(service_candidates(&workload).unwrap().is_empty());

        let unknown = Node::new(&NodeIdentity::unknown_source("east"), GraphType::App);
        assert!(service_candidates(&unknown).unwrap().is_empty());
    }
}
