//! Graph build orchestration: request options, the build pipeline,
//! finalization and the result cache

mod cache;
mod engine;
pub mod finalize;
mod options;

pub use cache::{CacheStats, GraphCache};
pub use engine::{build_graph, GraphEngine, GraphError, GraphResult};
pub use options::{GraphRequest, RequestedNamespace};
