//! Directional multi-query fusion shared by the telemetry appenders

use crate::graph::{GlobalInfo, NamespaceInfo};
use crate::source::{Sample, SourceResult};
use crate::telemetry::{directions, query_all, Direction};

/// Issue one query per traffic direction of `namespace`, concurrently.
///
/// Results come back in direction order. Nothing is mutated until every
/// query has completed.
pub async fn directional_samples(
    global: &GlobalInfo,
    namespace: &NamespaceInfo,
    include_istio: bool,
    expression: impl Fn(&Direction) -> String,
) -> SourceResult<Vec<Vec<Sample>>> {
    let dirs = directions(&namespace.name, &global.config.istio_namespace, include_istio);
    let expressions: Vec<String> = dirs.iter().map(expression).collect();
    query_all(global, namespace, &expressions).await
}
