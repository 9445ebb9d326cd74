//! Telemetry query and join utilities
//!
//! Everything that turns metric samples into graph structure or graph
//! metadata goes through here, so that all stages derive node identity the
//! same way.

mod direction;
mod join;
mod labels;
mod protocol;
mod query;
mod seed;

pub use direction::{directions, Direction, TRAFFIC_GROUP_BY};
pub use join::{EdgeKey, EdgeValueMap, JoinPlan};
pub use labels::{LabelError, TrafficLabels};
pub use protocol::{
    classify_request, record_traffic, record_traffic_on, Protocol, RateSides, ResponseClass,
};
pub use query::{query_all, query_vector};
pub use seed::{add_sample, SeedError, TrafficSeed};
