//! Post-processing of the merged multi-namespace graph

use crate::graph::{GlobalInfo, MetadataKey, MetadataResult, MetadataValue, NodeType, TrafficMap};
use super::GraphRequest;

/// Merge one namespace's map into the accumulated map.
///
/// On a node collision the instance from `namespace` is preferred, since it
/// was decorated with that namespace's appenders. Edges of the other
/// instance are carried over unless one to the same destination exists.
pub fn merge(merged: &mut TrafficMap, ns_traffic: TrafficMap, namespace: &str) {
    for mut node in ns_traffic.into_nodes() {
        if !merged.contains(&node.id) {
            merged.replace(node);
            continue;
        }
        let Some(existing) = merged.get_mut(&node.id) else { continue };
        if node.namespace == namespace {
            std::mem::swap(existing, &mut node);
        }
        // `existing` is now the preferred instance, `node` the other one
        for edge in node.edges {
            if existing.edge_to(&edge.dest).is_none() {
                existing.edges.push(edge);
            }
        }
    }
}

/// Flag nodes outside the requested namespaces, and those the caller may
/// not access.
pub fn mark_outsiders(traffic: &mut TrafficMap, request: &GraphRequest, global: &GlobalInfo) {
    for node in traffic.nodes_mut() {
        if node.node_type == NodeType::Unknown || request.is_requested(&node.namespace) {
            continue;
        }
        node.metadata.set_flag(MetadataKey::IsOutside);
        if !global.is_accessible(&node.namespace) {
            node.metadata.set_flag(MetadataKey::IsInaccessible);
        }
    }
}

/// Flag nodes that originate traffic but receive none.
pub fn mark_roots(traffic: &mut TrafficMap) {
    let destinations = traffic.destinations();
    for node in traffic.nodes_mut() {
        if !node.edges.is_empty() && !destinations.contains(&node.id) {
            node.metadata.set_flag(MetadataKey::IsRoot);
        }
    }
}

/// Collapse a workload graph into service-to-service edges.
///
/// Service nodes keep their identity and get one edge per downstream
/// service reached through their workloads, with rates summed. Non-service
/// nodes survive only as roots, keeping just their edges to services.
pub fn reduce_to_service_graph(traffic: TrafficMap) -> MetadataResult<TrafficMap> {
    let original = traffic.clone();
    let mut reduced = TrafficMap::new();

    for mut node in traffic.into_nodes() {
        if node.node_type != NodeType::Service {
            if node.metadata.flag(MetadataKey::IsRoot)? {
                node.edges.retain(|e| {
                    original
                        .get(&e.dest)
                        .is_some_and(|d| d.node_type == NodeType::Service)
                });
                reduced.replace(node);
            }
            continue;
        }

        let workload_edges = std::mem::take(&mut node.edges);
        for workload_edge in workload_edges {
            let Some(workload) = original.get(&workload_edge.dest) else { continue };
            for service_edge in &workload.edges {
                let is_service = original
                    .get(&service_edge.dest)
                    .is_some_and(|d| d.node_type == NodeType::Service);
                if !is_service {
                    continue;
                }
                let edge = node.add_edge(&service_edge.dest);
                for (key, value) in service_edge.metadata.iter() {
                    match value {
                        MetadataValue::Float(v) if MetadataKey::EDGE_RATES.contains(key) => {
                            edge.metadata.add_float(*key, *v)?;
                        }
                        other if !edge.metadata.contains(*key) => {
                            edge.metadata.insert(*key, other.clone());
                        }
                        _ => {}
                    }
                }
            }
        }
        reduced.replace(node);
    }
    Ok(reduced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphType, Node, NodeIdentity};

    fn wl(name: &str, ns: &str) -> Node {
        Node::new(&NodeIdentity::workload("east", ns, name, name, "v1"), GraphType::Workload)
    }

    fn svc(name: &str) -> Node {
        Node::new(&NodeIdentity::service("east", "bookinfo", name), GraphType::Workload)
    }

    #[test]
    fn merge_prefers_instance_from_merged_namespace() {
        let mut merged = TrafficMap::new();
        let mut other = wl("reviews", "bookinfo");
        other.metadata.set_flag(MetadataKey::IsOutside);
        let ratings = wl("ratings", "bookinfo");
        other.add_edge(&ratings.id);
        merged.add_node(other);

        let mut ns = TrafficMap::new();
        let mut preferred = wl("reviews", "bookinfo");
        preferred.metadata.set_flag(MetadataKey::HasCircuitBreaker);
        let id = preferred.id.clone();
        ns.add_node(preferred);
        merge(&mut merged, ns, "bookinfo");

        let node = merged.get(&id).unwrap();
        assert!(node.metadata.flag(MetadataKey::HasCircuitBreaker).unwrap());
        assert!(!node.metadata.flag(MetadataKey::IsOutside).unwrap());
        assert_eq!(node.edges.len(), 1);
    }

    #[test]
    fn roots_have_edges_and_no_callers() {
        let mut traffic = TrafficMap::new();
        let mut a = wl("productpage", "bookinfo");
        let b = wl("reviews", "bookinfo");
        let c = wl("idle", "bookinfo");
        a.add_edge(&b.id);
        let (a_id, b_id, c_id) = (a.id.clone(), b.id.clone(), c.id.clone());
        traffic.add_node(a);
        traffic.add_node(b);
        traffic.add_node(c);
        mark_roots(&mut traffic);
        assert!(traffic.get(&a_id).unwrap().metadata.flag(MetadataKey::IsRoot).unwrap());
        assert!(!traffic.get(&b_id).unwrap().metadata.flag(MetadataKey::IsRoot).unwrap());
        assert!(!traffic.get(&c_id).unwrap().metadata.flag(MetadataKey::IsRoot).unwrap());
    }

    #[test]
    fn service_graph_collapses_workload_hops() {
        // productpage -> svc reviews -> reviews-v1 -> svc ratings -> ratings-v1
        let mut traffic = TrafficMap::new();
        let mut productpage = wl("productpage", "bookinfo");
        let mut reviews_svc = svc("reviews");
        let mut reviews = wl("reviews", "bookinfo");
        let mut ratings_svc = svc("ratings");
        let ratings = wl("ratings", "bookinfo");

        productpage.add_edge(&reviews_svc.id);
        productpage.metadata.set_flag(MetadataKey::IsRoot);
        reviews_svc.add_edge(&reviews.id);
        reviews
            .add_edge(&ratings_svc.id)
            .metadata
            .add_float(MetadataKey::Http, 2.0)
            .unwrap();
        ratings_svc.add_edge(&ratings.id);

        let (pp, rs, rts) = (productpage.id.clone(), reviews_svc.id.clone(), ratings_svc.id.clone());
        for n in [productpage, reviews_svc, reviews, ratings_svc, ratings] {
            traffic.add_node(n);
        }

        let reduced = reduce_to_service_graph(traffic).unwrap();
        assert_eq!(reduced.len(), 3);
        assert_eq!(reduced.get(&pp).unwrap().edges.len(), 1);
        let edge = reduced.get(&rs).unwrap().edge_to(&rts).unwrap();
        assert_eq!(edge.metadata.rate(MetadataKey::Http).unwrap(), 2.0);
        assert_eq!(edge.source, rs);
        assert!(reduced.get(&rts).unwrap().edges.is_empty());
    }
}
