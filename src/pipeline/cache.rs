//! Whole-graph result cache
//!
//! Keyed by the canonical serialization of the request. Concurrent requests
//! for the same key share one in-flight build; only the first caller runs it.

use super::engine::{GraphError, GraphResult};
use crate::graph::TrafficMap;
use moka::future::Cache;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct GraphCache {
    cache: Cache<String, Arc<TrafficMap>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl GraphCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached graph for `key`, building it with `build` if absent.
    ///
    /// Callers that wait on another caller's build count as hits. Failed
    /// builds are not cached.
    pub async fn get_or_build<F>(&self, key: String, build: F) -> GraphResult<Arc<TrafficMap>>
    where
        F: Future<Output = GraphResult<TrafficMap>>,
    {
        let built = AtomicBool::new(false);
        let result = self
            .cache
            .try_get_with(key, async {
                built.store(true, Ordering::Relaxed);
                build.await.map(Arc::new)
            })
            .await;

        if built.load(Ordering::Relaxed) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("graph cache miss");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("graph cache hit");
        }
        result.map_err(GraphError::Shared)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl std::fmt::Debug for GraphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_lookup_is_a_hit() {
        let cache = GraphCache::new(8, Duration::from_secs(60));
        cache
            .get_or_build("k".into(), async { Ok(TrafficMap::new()) })
            .await
            .unwrap();
        cache
            .get_or_build("k".into(), async { Ok(TrafficMap::new()) })
            .await
            .unwrap();
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = GraphCache::new(8, Duration::from_secs(60));
        let err = cache
            .get_or_build("k".into(), async { Err(GraphError::NoNamespaces) })
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Shared(_)));
        cache
            .get_or_build("k".into(), async { Ok(TrafficMap::new()) })
            .await
            .unwrap();
        assert_eq!(cache.stats().misses, 2);
    }
}
