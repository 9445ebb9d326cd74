//! Instant-vector queries against the metrics backend

use crate::graph::{GlobalInfo, NamespaceInfo};
use crate::source::{Sample, SourceResult};
use futures::future::try_join_all;
use std::time::Instant;
use tracing::{debug, trace};

/// Run `expression` at the namespace's query time, rounded to three decimals.
pub async fn query_vector(
    global: &GlobalInfo,
    namespace: &NamespaceInfo,
    expression: &str,
) -> SourceResult<Vec<Sample>> {
    let rounded = format!("round({expression},0.001)");
    let started = Instant::now();
    trace!(query = %rounded, "metrics query");
    let metrics = global.sources.metrics.clone();
    let samples = global
        .deadline
        .guard(async { metrics.query(&rounded, namespace.query_time).await })
        .await?;
    debug!(
        namespace = %namespace.name,
        samples = samples.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "metrics query complete"
    );
    Ok(samples)
}

/// Run every expression concurrently; the first failure aborts the rest.
pub async fn query_all(
    global: &GlobalInfo,
    namespace: &NamespaceInfo,
    expressions: &[String],
) -> SourceResult<Vec<Vec<Sample>>> {
    try_join_all(
        expressions
            .iter()
            .map(|expr| query_vector(global, namespace, expr)),
    )
    .await
}
