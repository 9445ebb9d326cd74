//! GraphEngine: the main entry point for building traffic graphs

use super::cache::{CacheStats, GraphCache};
use super::finalize;
use super::options::GraphRequest;
use crate::appender::{AppenderChain, AppenderError};
use crate::config::GraphConfig;
use crate::graph::{GlobalInfo, GraphType, MetadataError, NamespaceInfo, TrafficMap};
use crate::source::{BuildDeadline, SourceError, SourceSet};
use crate::telemetry::{JoinPlan, SeedError, TrafficSeed};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Errors that fail a graph build
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no namespaces requested")]
    NoNamespaces,

    #[error("unknown appender: {0}")]
    UnknownAppender(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("traffic seed failed: {0}")]
    Seed(#[from] SeedError),

    #[error("appender {appender} failed: {source}")]
    Appender {
        appender: &'static str,
        #[source]
        source: AppenderError,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("invalid request: {0}")]
    Request(#[from] serde_json::Error),

    #[error(transparent)]
    Shared(Arc<GraphError>),
}

/// Result type for graph builds
pub type GraphResult<T> = Result<T, GraphError>;

/// Build the traffic graph for every requested namespace.
///
/// Each namespace is seeded, run through `chain`, and merged; the merged
/// graph is then finalized. The first failure aborts the build.
pub async fn build_graph(
    seed: &TrafficSeed,
    request: &GraphRequest,
    chain: &AppenderChain,
    global: &mut GlobalInfo,
) -> GraphResult<TrafficMap> {
    if request.namespaces.is_empty() {
        return Err(GraphError::NoNamespaces);
    }
    let build_id = Uuid::new_v4();
    let span = info_span!("build_graph", %build_id, graph_type = %request.graph_type);

    async move {
        let plan = JoinPlan::new(
            request.graph_type,
            request.inject_service_nodes,
            global.config.default_cluster.clone(),
        );
        let mut merged = TrafficMap::new();

        for requested in &request.namespaces {
            global.deadline.check()?;
            let namespace = NamespaceInfo::new(
                requested.name.clone(),
                request.duration(),
                requested.created_at,
                request.query_time,
            );
            let mut traffic = seed
                .namespace_traffic(global, &namespace, &plan, request.include_istio)
                .await?;
            chain.run(&mut traffic, global, &namespace).await?;
            finalize::merge(&mut merged, traffic, &namespace.name);
        }

        finalize::mark_outsiders(&mut merged, request, global);
        finalize::mark_roots(&mut merged);
        if request.graph_type == GraphType::Service {
            merged = finalize::reduce_to_service_graph(merged)?;
        }

        info!(nodes = merged.len(), edges = merged.edge_count(), "graph built");
        Ok(merged)
    }
    .instrument(span)
    .await
}

/// Builds graphs from a fixed set of collaborators, optionally caching
/// whole results.
#[derive(Debug)]
pub struct GraphEngine {
    sources: SourceSet,
    config: Arc<GraphConfig>,
    seed: TrafficSeed,
    cache: Option<GraphCache>,
}

impl GraphEngine {
    pub fn new(sources: SourceSet, config: GraphConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| GraphCache::new(config.cache.capacity, config.cache.ttl()));
        Self {
            sources,
            config: Arc::new(config),
            seed: TrafficSeed::default(),
            cache,
        }
    }

    pub fn with_seed(mut self, seed: TrafficSeed) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Build the graph for `request` with the configured build timeout.
    pub async fn build(&self, request: &GraphRequest) -> GraphResult<Arc<TrafficMap>> {
        let deadline = BuildDeadline::with_timeout(self.config.build_timeout());
        self.build_with_deadline(request, deadline).await
    }

    /// Build the graph for `request` under a caller-supplied deadline.
    pub async fn build_with_deadline(
        &self,
        request: &GraphRequest,
        deadline: BuildDeadline,
    ) -> GraphResult<Arc<TrafficMap>> {
        let request = request.clone().normalized();
        match &self.cache {
            Some(cache) => {
                let key = request.cache_key()?;
                cache
                    .get_or_build(key, self.build_uncached(&request, deadline))
                    .await
            }
            None => self.build_uncached(&request, deadline).await.map(Arc::new),
        }
    }

    async fn build_uncached(
        &self,
        request: &GraphRequest,
        deadline: BuildDeadline,
    ) -> GraphResult<TrafficMap> {
        let chain = AppenderChain::from_request(request, &self.config)?;
        let mut global = GlobalInfo::new(
            self.sources.clone(),
            self.config.clone(),
            deadline,
            request.accessible(),
        );
        build_graph(&self.seed, request, &chain, &mut global).await
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(GraphCache::stats)
    }
}
