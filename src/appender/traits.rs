//! Appender trait: the contract every enrichment stage implements
//!
//! An appender consults one external source and mutates the traffic map in
//! place. Appenders run sequentially in a fixed order, so each may assume
//! the stages before it have completed.

use crate::graph::{GlobalInfo, MetadataError, NamespaceInfo, TrafficMap};
use crate::source::SourceError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that abort an appender
#[derive(Debug, Error)]
pub enum AppenderError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub type AppenderResult<T = ()> = Result<T, AppenderError>;

#[async_trait]
pub trait Appender: Send + Sync {
    /// Stable name, used for selection in requests and for deduplication.
    fn name(&self) -> &'static str;

    /// Enrich `traffic` for one namespace.
    async fn append_graph(
        &self,
        traffic: &mut TrafficMap,
        global: &mut GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> AppenderResult;
}
