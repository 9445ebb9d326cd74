//! Common test utilities for meshgraph integration tests
//!
//! Provides telemetry sample builders, the bookinfo demo inventory and
//! helpers for wiring in-memory collaborators into a build.

#![allow(dead_code)]

pub mod fixtures;
pub mod samples;

pub use fixtures::{bookinfo_mesh, bookinfo_workloads, global_info, global_with_metrics, namespace_info, BOOKINFO};
pub use samples::{ingress, node_id, seed_map, traffic_sample, with_labels, workload, Endpoint, UNKNOWN_SOURCE};
