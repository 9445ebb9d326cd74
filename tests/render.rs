//! Rendering traffic maps into visualization documents
//!
//! Run with: `cargo test --test render`

mod common;

use common::{ingress, seed_map, traffic_sample, workload, BOOKINFO, UNKNOWN_SOURCE};
use meshgraph::graph::{GraphType, TrafficMap};
use meshgraph::render::{render, RenderOptions, COLOR_HEALTHY};
use serde_json::Value;
use std::collections::HashSet;

fn bookinfo(graph_type: GraphType) -> TrafficMap {
    let productpage = workload(BOOKINFO, "productpage-v1", "productpage", "v1");
    seed_map(
        graph_type,
        false,
        &[
            traffic_sample(UNKNOWN_SOURCE, "productpage", productpage, 1.0),
            traffic_sample(ingress(), "productpage", productpage, 4.0),
            traffic_sample(productpage, "details", workload(BOOKINFO, "details-v1", "details", "v1"), 4.0),
            traffic_sample(productpage, "reviews", workload(BOOKINFO, "reviews-v1", "reviews", "v1"), 2.0),
            traffic_sample(productpage, "reviews", workload(BOOKINFO, "reviews-v2", "reviews", "v2"), 2.0),
        ],
    )
}

fn options(graph_type: GraphType) -> RenderOptions {
    RenderOptions {
        graph_type,
        duration_secs: 600,
        timestamp: 1_700_000_000,
        group_by_version: false,
    }
}

#[test]
fn rendering_keeps_every_node_and_edge() {
    for graph_type in [GraphType::App, GraphType::VersionedApp, GraphType::Workload] {
        let traffic = bookinfo(graph_type);
        let doc = render(&traffic, &options(graph_type));
        assert_eq!(doc.elements.nodes.len(), traffic.len(), "{graph_type}");
        assert_eq!(doc.elements.edges.len(), traffic.edge_count(), "{graph_type}");

        let semantic: HashSet<&str> = doc.elements.nodes.iter().map(|n| n.data.node_id.as_str()).collect();
        assert_eq!(semantic.len(), traffic.len());
    }
}

#[test]
fn display_ids_are_sequential_and_edges_resolve() {
    let traffic = bookinfo(GraphType::Workload);
    let doc = render(&traffic, &options(GraphType::Workload));

    let mut ids: Vec<usize> = doc
        .elements
        .nodes
        .iter()
        .map(|n| n.data.id.trim_start_matches('n').parse().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, (0..traffic.len()).collect::<Vec<_>>());

    let known: HashSet<&str> = doc.elements.nodes.iter().map(|n| n.data.id.as_str()).collect();
    for edge in &doc.elements.edges {
        assert!(edge.data.id.starts_with('e'));
        assert!(known.contains(edge.data.source.as_str()));
        assert!(known.contains(edge.data.target.as_str()));
        assert_eq!(edge.data.color, COLOR_HEALTHY);
    }
}

#[test]
fn output_is_sorted_and_stable() {
    let traffic = bookinfo(GraphType::VersionedApp);
    let first = render(&traffic, &options(GraphType::VersionedApp)).to_json().unwrap();
    let second = render(&traffic.clone(), &options(GraphType::VersionedApp)).to_json().unwrap();
    assert_eq!(first, second);

    let doc = render(&traffic, &options(GraphType::VersionedApp));
    let texts: Vec<&str> = doc.elements.nodes.iter().map(|n| n.data.text.as_str()).collect();
    let mut sorted = texts.clone();
    sorted.sort();
    assert_eq!(texts, sorted);

    let pairs: Vec<(&str, &str)> = doc
        .elements
        .edges
        .iter()
        .map(|e| (e.data.source.as_str(), e.data.target.as_str()))
        .collect();
    let mut sorted_pairs = pairs.clone();
    sorted_pairs.sort();
    assert_eq!(pairs, sorted_pairs);
}

#[test]
fn document_json_shape() {
    let traffic = bookinfo(GraphType::VersionedApp);
    let json = render(&traffic, &options(GraphType::VersionedApp)).to_json().unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["graphType"], "versionedApp");
    assert_eq!(value["duration"], 600);
    let nodes = value["elements"]["nodes"].as_array().unwrap();
    let reviews_v2 = nodes
        .iter()
        .map(|n| &n["data"])
        .find(|d| d["text"] == "reviews v2")
        .unwrap();
    assert_eq!(reviews_v2["nodeType"], "app");
    assert_eq!(reviews_v2["version"], "v2");
    assert_eq!(reviews_v2["httpIn"], 2.0);
    assert!(reviews_v2.get("service").is_none());

    let edge = &value["elements"]["edges"][0]["data"];
    assert!(edge["text"].is_string());
    assert_eq!(edge["protocol"], "http");
}

#[test]
fn versions_are_grouped_under_a_parent() {
    let traffic = bookinfo(GraphType::VersionedApp);
    let opts = RenderOptions {
        group_by_version: true,
        ..options(GraphType::VersionedApp)
    };
    let doc = render(&traffic, &opts);

    assert_eq!(doc.elements.nodes.len(), traffic.len() + 1);
    let group = doc
        .elements
        .nodes
        .iter()
        .find(|n| n.data.is_group.is_some())
        .unwrap();
    assert_eq!(group.data.app, "reviews");
    let children: Vec<&str> = doc
        .elements
        .nodes
        .iter()
        .filter(|n| n.data.parent.as_deref() == Some(group.data.id.as_str()))
        .map(|n| n.data.version.as_str())
        .collect();
    assert_eq!(children.len(), 2);
    assert!(children.contains(&"v1") && children.contains(&"v2"));
}
