//! Rendering of traffic maps into a node/edge visualization document
//!
//! Display IDs are sequential (`n0, n1, …` and `e0, e1, …`) in traversal
//! order from the roots. Nodes are sorted by display text, edges by source
//! then target.

mod convert;
mod types;

pub use convert::{edge_display, render, RenderOptions, COLOR_DEGRADED, COLOR_ERROR, COLOR_HEALTHY, COLOR_NONE};
pub use types::{EdgeData, EdgeWrapper, Elements, GraphDocument, NodeData, NodeWrapper};
