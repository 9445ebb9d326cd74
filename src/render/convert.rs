//! Traffic map to visualization document

use super::types::{EdgeData, EdgeWrapper, Elements, GraphDocument, NodeData, NodeWrapper};
use crate::graph::{GraphType, Metadata, MetadataKey, Node, NodeId, NodeType, TrafficMap};
use crate::pipeline::GraphRequest;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub graph_type: GraphType,
    pub duration_secs: u64,
    pub timestamp: i64,
    /// Group versioned nodes of one app under a synthetic parent
    pub group_by_version: bool,
}

impl RenderOptions {
    pub fn from_request(request: &GraphRequest) -> Self {
        Self {
            graph_type: request.graph_type,
            duration_secs: request.duration_secs,
            timestamp: request.query_time.timestamp(),
            group_by_version: false,
        }
    }

    pub fn with_group_by_version(mut self, group: bool) -> Self {
        self.group_by_version = group;
        self
    }
}

pub const COLOR_NONE: &str = "black";
pub const COLOR_ERROR: &str = "red";
pub const COLOR_DEGRADED: &str = "orange";
pub const COLOR_HEALTHY: &str = "green";

fn rate(md: &Metadata, key: MetadataKey) -> f64 {
    md.rate(key).unwrap_or(0.0)
}

/// Display text and color of an edge from its request success ratio.
pub fn edge_display(md: &Metadata) -> (String, &'static str) {
    let requests = rate(md, MetadataKey::Http) + rate(md, MetadataKey::Grpc);
    let errors = rate(md, MetadataKey::Http4xx)
        + rate(md, MetadataKey::Http5xx)
        + rate(md, MetadataKey::GrpcErr);
    if requests <= 0.0 {
        let tcp = rate(md, MetadataKey::Tcp);
        if tcp > 0.0 {
            return (format!("{tcp:.2}"), COLOR_HEALTHY);
        }
        return ("0".to_string(), COLOR_NONE);
    }
    let ratio = errors / requests;
    let color = if ratio > 1.0 {
        COLOR_ERROR
    } else if ratio > 0.0 {
        COLOR_DEGRADED
    } else {
        COLOR_HEALTHY
    };
    (format!("{requests:.2}"), color)
}

fn node_text(node: &Node) -> String {
    match node.node_type {
        NodeType::Service => node.service.clone(),
        NodeType::App if !node.version.is_empty() => format!("{} {}", node.app, node.version),
        NodeType::App => node.app.clone(),
        NodeType::Workload => node.workload.clone(),
        NodeType::Unknown => "unknown".to_string(),
        NodeType::Aggregate => {
            let label = node.metadata.text(MetadataKey::Aggregate).ok().flatten().unwrap_or_default();
            let value = node.metadata.text(MetadataKey::AggregateValue).ok().flatten().unwrap_or_default();
            format!("{label}={value}")
        }
    }
}

/// Nodes in display order: breadth-first from the sorted roots, then any
/// nodes only reachable through cycles.
fn traversal_order(traffic: &TrafficMap) -> Vec<NodeId> {
    let ids = traffic.ids();
    let destinations = traffic.destinations();
    let roots = ids.iter().filter(|id| !destinations.contains(*id));

    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut order = Vec::with_capacity(ids.len());
    for start in roots.chain(ids.iter()) {
        if visited.contains(start) {
            continue;
        }
        let mut worklist = VecDeque::from([start.clone()]);
        while let Some(id) = worklist.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(node) = traffic.get(&id) else { continue };
            let mut dests: Vec<&NodeId> = node
                .edges
                .iter()
                .map(|e| &e.dest)
                .filter(|d| traffic.contains(d) && !visited.contains(*d))
                .collect();
            dests.sort();
            worklist.extend(dests.into_iter().cloned());
            order.push(id);
        }
    }
    order
}

/// Render `traffic` into a sorted visualization document.
pub fn render(traffic: &TrafficMap, options: &RenderOptions) -> GraphDocument {
    let order = traversal_order(traffic);
    let display: HashMap<&NodeId, String> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id, format!("n{i}")))
        .collect();

    let mut nodes: Vec<NodeData> = order
        .iter()
        .filter_map(|id| traffic.get(id))
        .map(|node| NodeData {
            id: display.get(&node.id).cloned().unwrap_or_default(),
            parent: None,
            node_id: node.id.to_string(),
            node_type: node.node_type.to_string(),
            cluster: node.cluster.clone(),
            namespace: node.namespace.clone(),
            workload: node.workload.clone(),
            app: node.app.clone(),
            version: node.version.clone(),
            service: node.service.clone(),
            text: node_text(node),
            is_group: None,
            metadata: node.metadata.clone(),
        })
        .collect();

    let mut edges: Vec<EdgeData> = Vec::new();
    for id in &order {
        let Some(node) = traffic.get(id) else { continue };
        let mut node_edges: Vec<_> = node.edges.iter().collect();
        node_edges.sort_by(|a, b| a.dest.cmp(&b.dest));
        for edge in node_edges {
            let (Some(source), Some(target)) = (display.get(&edge.source), display.get(&edge.dest)) else {
                continue;
            };
            let (text, color) = edge_display(&edge.metadata);
            edges.push(EdgeData {
                id: format!("e{}", edges.len()),
                source: source.clone(),
                target: target.clone(),
                text,
                color: color.to_string(),
                metadata: edge.metadata.clone(),
            });
        }
    }

    if options.group_by_version {
        group_versions(&mut nodes);
    }

    nodes.sort_by(|a, b| a.text.cmp(&b.text).then_with(|| a.id.cmp(&b.id)));
    edges.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.target.cmp(&b.target)));

    GraphDocument {
        timestamp: options.timestamp,
        duration: options.duration_secs,
        graph_type: options.graph_type,
        elements: Elements {
            nodes: nodes.into_iter().map(|data| NodeWrapper { data }).collect(),
            edges: edges.into_iter().map(|data| EdgeWrapper { data }).collect(),
        },
    }
}

/// Add a parent node per (namespace, app) that has more than one version.
fn group_versions(nodes: &mut Vec<NodeData>) {
    let mut versions: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
    for n in nodes.iter() {
        let groupable = n.node_type == NodeType::App.as_str() || n.node_type == NodeType::Workload.as_str();
        if groupable && !n.app.is_empty() && !n.version.is_empty() {
            versions
                .entry((n.namespace.clone(), n.app.clone()))
                .or_default()
                .insert(n.version.clone());
        }
    }

    let mut next = nodes.len();
    for ((namespace, app), found) in versions {
        if found.len() < 2 {
            continue;
        }
        let parent_id = format!("n{next}");
        next += 1;
        let mut cluster = String::new();
        for n in nodes.iter_mut() {
            if n.namespace == namespace && n.app == app && !n.version.is_empty() && n.is_group.is_none() {
                n.parent = Some(parent_id.clone());
                cluster = n.cluster.clone();
            }
        }
        nodes.push(NodeData {
            id: parent_id,
            parent: None,
            node_id: String::new(),
            node_type: NodeType::App.to_string(),
            cluster,
            namespace,
            workload: String::new(),
            app: app.clone(),
            version: String::new(),
            service: String::new(),
            text: app,
            is_group: Some("version".to_string()),
            metadata: Metadata::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_colors_follow_error_ratio() {
        let mut md = Metadata::new();
        assert_eq!(edge_display(&md), ("0".to_string(), COLOR_NONE));

        md.insert(MetadataKey::Http, 10.0);
        assert_eq!(edge_display(&md), ("10.00".to_string(), COLOR_HEALTHY));

        md.insert(MetadataKey::Http5xx, 1.0);
        assert_eq!(edge_display(&md).1, COLOR_DEGRADED);

        md.insert(MetadataKey::Http4xx, 20.0);
        assert_eq!(edge_display(&md).1, COLOR_ERROR);
    }

    #[test]
    fn tcp_only_edge_shows_bytes() {
        let mut md = Metadata::new();
        md.insert(MetadataKey::Tcp, 512.0);
        assert_eq!(edge_display(&md), ("512.00".to_string(), COLOR_HEALTHY));
    }
}
