//! Meshgraph: service-mesh traffic graph engine
//!
//! Builds a directed graph of observed request traffic between the
//! workloads, apps and services of a mesh, from time-windowed telemetry,
//! and enriches it through an ordered chain of appenders.
//!
//! # Core Concepts
//!
//! - **Nodes**: workloads, apps, services, request aggregates, or the unknown
//!   source, keyed by a deterministic ID derived from telemetry labels and
//!   the graph type
//! - **Edges**: observed traffic from one node to another, carrying rates
//! - **Appenders**: stages that prune, decorate, or synthesize graph content
//!
//! # Example
//!
//! ```
//! use meshgraph::{GraphConfig, GraphEngine, GraphRequest, GraphType, StaticFixture};
//!
//! let sources = StaticFixture::default().into_sources();
//! let engine = GraphEngine::new(sources, GraphConfig::default());
//! let request = GraphRequest::new(GraphType::Workload, chrono::Utc::now()).with_namespace("bookinfo");
//! // engine.build(&request).await
//! # let _ = (engine, request);
//! ```

pub mod appender;
pub mod config;
pub mod graph;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod telemetry;

pub use appender::{Appender, AppenderChain, AppenderError, AppenderResult};
pub use config::{CacheConfig, ConfigError, GraphConfig};
pub use graph::{
    Edge, GlobalInfo, GraphType, Metadata, MetadataKey, MetadataValue, NamespaceInfo, Node,
    NodeId, NodeIdentity, NodeType, TrafficMap,
};
pub use pipeline::{GraphEngine, GraphError, GraphRequest, GraphResult};
pub use render::{render, GraphDocument, RenderOptions};
pub use source::{BuildDeadline, SourceError, SourceResult, SourceSet, StaticFixture};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
