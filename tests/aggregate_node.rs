//! Request aggregation through synthetic aggregate nodes
//!
//! Run with: `cargo test --test aggregate_node`

mod common;

use common::{global_with_metrics, namespace_info, node_id, seed_map, traffic_sample, with_labels, workload, BOOKINFO};
use meshgraph::appender::{AggregateNodeAppender, AggregateOptions, Appender};
use meshgraph::graph::{aggregate_id, GraphType, MetadataKey, NodeIdentity, NodeType, TrafficMap};
use meshgraph::source::{MetricRule, Sample, StaticMesh, StaticMetrics};
use meshgraph::telemetry::JoinPlan;
use std::sync::Arc;

const GRAPH: GraphType = GraphType::VersionedApp;
const OPERATION: &str = "request_operation";

fn productpage_to_reviews(value: f64) -> Sample {
    traffic_sample(
        workload(BOOKINFO, "productpage-v1", "productpage", "v1"),
        "reviews",
        workload(BOOKINFO, "reviews-v1", "reviews", "v1"),
        value,
    )
}

fn operation(value: &str, rate: f64) -> Sample {
    with_labels(productpage_to_reviews(rate), &[(OPERATION, value)])
}

async fn aggregate(
    inject: bool,
    graph_type: GraphType,
    options: AggregateOptions,
    rules: Vec<MetricRule>,
) -> (TrafficMap, Arc<StaticMetrics>) {
    let metrics = Arc::new(StaticMetrics::new(rules));
    let mut global = global_with_metrics(StaticMesh::new(), metrics.clone());
    let mut traffic = seed_map(graph_type, inject, &[productpage_to_reviews(10.0)]);
    AggregateNodeAppender::new(JoinPlan::new(graph_type, inject, "unknown"), options)
        .append_graph(&mut traffic, &mut global, &namespace_info(BOOKINFO))
        .await
        .unwrap();
    (traffic, metrics)
}

fn inside_rule() -> MetricRule {
    MetricRule::new(
        ["istio_requests_total", r#"source_workload_namespace="bookinfo""#, r#"request_operation!="unknown""#],
        vec![operation("Top", 6.0), operation("All", 4.0)],
    )
}

#[tokio::test]
async fn aggregates_sit_between_caller_and_injected_service() {
    let (traffic, _) = aggregate(true, GRAPH, AggregateOptions::new(OPERATION), vec![inside_rule()]).await;

    let service = NodeIdentity::service("unknown", BOOKINFO, "reviews").resolve(GRAPH).id;
    let productpage = traffic
        .get(&node_id(workload(BOOKINFO, "productpage-v1", "productpage", "v1"), GRAPH))
        .unwrap();
    assert_eq!(productpage.edges.len(), 2);
    assert!(productpage.edge_to(&service).is_none());
    assert_eq!(productpage.metadata.rate(MetadataKey::HttpOut).unwrap(), 10.0);

    for (value, rate) in [("Top", 6.0), ("All", 4.0)] {
        let id = aggregate_id("unknown", BOOKINFO, OPERATION, value, "reviews");
        let node = traffic.get(&id).unwrap();
        assert_eq!(node.node_type, NodeType::Aggregate);
        assert_eq!(node.metadata.text(MetadataKey::Aggregate).unwrap(), Some(OPERATION));
        assert_eq!(node.metadata.text(MetadataKey::AggregateValue).unwrap(), Some(value));
        assert_eq!((node.app.as_str(), node.service.as_str()), ("reviews", "reviews"));
        assert_eq!(node.metadata.rate(MetadataKey::HttpIn).unwrap(), rate);
        assert_eq!(node.metadata.rate(MetadataKey::HttpOut).unwrap(), rate);
        assert_eq!(node.edges.len(), 1);
        assert_eq!(node.edges[0].dest, service);
        assert_eq!(node.edges[0].metadata.rate(MetadataKey::Http).unwrap(), rate);
        assert!(productpage.edge_to(&id).is_some());
    }

    // the service already counted this traffic when the map was seeded
    let reviews = traffic.get(&service).unwrap();
    assert_eq!(reviews.metadata.rate(MetadataKey::HttpIn).unwrap(), 10.0);
    assert_eq!(reviews.edges.len(), 1);
}

#[tokio::test]
async fn without_injection_aggregates_lead_to_the_app() {
    let (traffic, _) = aggregate(false, GRAPH, AggregateOptions::new(OPERATION), vec![inside_rule()]).await;

    let reviews = node_id(workload(BOOKINFO, "reviews-v1", "reviews", "v1"), GRAPH);
    let top = traffic
        .get(&aggregate_id("unknown", BOOKINFO, OPERATION, "Top", ""))
        .unwrap();
    assert!(top.app.is_empty());
    assert!(top.service.is_empty());
    assert_eq!(top.edges[0].dest, reviews);

    let aggregates = traffic.nodes().filter(|n| n.node_type == NodeType::Aggregate).count();
    assert_eq!(aggregates, 2);
    assert!(traffic.edges().all(|e| e.dest != reviews || e.source.as_str().starts_with("agg_")));
}

#[tokio::test]
async fn value_selects_one_aggregate_for_one_service() {
    let rule = MetricRule::new(
        [r#"request_operation="Top""#, r#"destination_service_name="reviews""#],
        vec![operation("Top", 6.0)],
    );
    let options = AggregateOptions::new(OPERATION).with_value("Top").with_service("reviews");
    let (traffic, metrics) = aggregate(true, GRAPH, options, vec![rule]).await;

    assert_eq!(metrics.queries().len(), 1);
    let productpage = traffic
        .get(&node_id(workload(BOOKINFO, "productpage-v1", "productpage", "v1"), GRAPH))
        .unwrap();
    assert_eq!(productpage.edges.len(), 1);
    assert_eq!(
        productpage.edges[0].dest,
        aggregate_id("unknown", BOOKINFO, OPERATION, "Top", "reviews")
    );
}

#[tokio::test]
async fn unlabelled_or_unknown_endpoints_are_left_alone() {
    let stranger = with_labels(
        traffic_sample(
            workload(BOOKINFO, "details-v1", "details", "v1"),
            "reviews",
            workload(BOOKINFO, "reviews-v1", "reviews", "v1"),
            3.0,
        ),
        &[(OPERATION, "Top")],
    );
    let rule = MetricRule::new(["istio_requests_total"], vec![productpage_to_reviews(5.0), stranger]);
    let (traffic, _) = aggregate(true, GRAPH, AggregateOptions::new(OPERATION), vec![rule]).await;

    assert!(traffic.nodes().all(|n| n.node_type != NodeType::Aggregate));
    assert_eq!(traffic.edge_count(), 2);
}

#[tokio::test]
async fn service_graphs_are_not_aggregated() {
    let (traffic, metrics) = aggregate(
        true,
        GraphType::Service,
        AggregateOptions::new(OPERATION),
        vec![inside_rule()],
    )
    .await;
    assert!(metrics.queries().is_empty());
    assert!(traffic.nodes().all(|n| n.node_type != NodeType::Aggregate));
}
