//! Per-request build options

use crate::appender::{AggregateOptions, ThroughputType};
use crate::graph::GraphType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A namespace to build, with its creation time when known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedNamespace {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Everything that determines the result of one graph build.
///
/// Serializes canonically once [`GraphRequest::normalized`], which makes it
/// usable as the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphRequest {
    pub graph_type: GraphType,
    pub namespaces: Vec<RequestedNamespace>,
    /// Namespaces the caller may see; requested namespaces are always included
    pub accessible_namespaces: Vec<String>,
    pub duration_secs: u64,
    pub query_time: DateTime<Utc>,
    /// Appender names to run; `None` runs all of them
    pub appenders: Option<Vec<String>>,
    pub inject_service_nodes: bool,
    pub include_istio: bool,
    pub response_time_quantile: Option<f64>,
    pub throughput_type: ThroughputType,
    /// Label the aggregate-node appender classifies requests by
    pub aggregate: Option<AggregateOptions>,
}

impl Default for GraphRequest {
    fn default() -> Self {
        Self {
            graph_type: GraphType::default(),
            namespaces: Vec::new(),
            accessible_namespaces: Vec::new(),
            duration_secs: 600,
            query_time: Utc::now(),
            appenders: None,
            inject_service_nodes: false,
            include_istio: false,
            response_time_quantile: None,
            throughput_type: ThroughputType::default(),
            aggregate: None,
        }
    }
}

impl GraphRequest {
    pub fn new(graph_type: GraphType, query_time: DateTime<Utc>) -> Self {
        Self {
            graph_type,
            query_time,
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, name: impl Into<String>) -> Self {
        self.namespaces.push(RequestedNamespace {
            name: name.into(),
            created_at: None,
        });
        self
    }

    pub fn with_namespace_created(mut self, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        self.namespaces.push(RequestedNamespace {
            name: name.into(),
            created_at: Some(created_at),
        });
        self
    }

    pub fn with_accessible(mut self, namespace: impl Into<String>) -> Self {
        self.accessible_namespaces.push(namespace.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_secs = duration.as_secs();
        self
    }

    pub fn with_appenders<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.appenders = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_service_injection(mut self, inject: bool) -> Self {
        self.inject_service_nodes = inject;
        self
    }

    pub fn with_istio(mut self, include: bool) -> Self {
        self.include_istio = include;
        self
    }

    pub fn with_quantile(mut self, quantile: f64) -> Self {
        self.response_time_quantile = Some(quantile);
        self
    }

    pub fn with_throughput(mut self, throughput_type: ThroughputType) -> Self {
        self.throughput_type = throughput_type;
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateOptions) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Sort and deduplicate list-valued options.
    pub fn normalized(mut self) -> Self {
        self.namespaces.sort_by(|a, b| a.name.cmp(&b.name));
        self.namespaces.dedup_by(|a, b| a.name == b.name);
        self.accessible_namespaces.sort();
        self.accessible_namespaces.dedup();
        if let Some(names) = &mut self.appenders {
            names.sort();
            names.dedup();
        }
        self
    }

    pub fn is_requested(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|n| n.name == namespace)
    }

    /// Accessible namespaces including the requested ones.
    pub fn accessible(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .accessible_namespaces
            .iter()
            .cloned()
            .chain(self.namespaces.iter().map(|n| n.name.clone()))
            .collect();
        all.sort();
        all.dedup();
        all
    }

    pub fn cache_key(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
