//! Typed metadata carried by nodes and edges
//!
//! Keys come from one closed registry ([`MetadataKey`]) and values from one
//! closed tagged type ([`MetadataValue`]). Accessors fail with
//! [`MetadataError::TypeMismatch`] when a key holds a value of another shape.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Every metadata key known to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataKey {
    // edge rates
    Http,
    Http3xx,
    Http4xx,
    Http5xx,
    Grpc,
    GrpcErr,
    Tcp,
    // node rates
    HttpIn,
    HttpIn3xx,
    HttpIn4xx,
    HttpIn5xx,
    HttpOut,
    GrpcIn,
    GrpcInErr,
    GrpcOut,
    TcpIn,
    TcpOut,
    // edge decorations
    Protocol,
    ResponseTime,
    Throughput,
    IsMtls,
    SourcePrincipal,
    DestPrincipal,
    // node decorations
    Aggregate,
    AggregateValue,
    DestServices,
    HasCircuitBreaker,
    HasVirtualService,
    HasRequestRouting,
    HasFaultInjection,
    HasTrafficShifting,
    HasRequestTimeout,
    HasMirroring,
    HasMtls,
    HasMissingSidecars,
    HealthData,
    HealthDataApp,
    IsDead,
    IsEgress,
    IsInaccessible,
    IsOutside,
    IsRoot,
    IsUnused,
}

impl MetadataKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKey::Http => "http",
            MetadataKey::Http3xx => "http3xx",
            MetadataKey::Http4xx => "http4xx",
            MetadataKey::Http5xx => "http5xx",
            MetadataKey::Grpc => "grpc",
            MetadataKey::GrpcErr => "grpcErr",
            MetadataKey::Tcp => "tcp",
            MetadataKey::HttpIn => "httpIn",
            MetadataKey::HttpIn3xx => "httpIn3xx",
            MetadataKey::HttpIn4xx => "httpIn4xx",
            MetadataKey::HttpIn5xx => "httpIn5xx",
            MetadataKey::HttpOut => "httpOut",
            MetadataKey::GrpcIn => "grpcIn",
            MetadataKey::GrpcInErr => "grpcInErr",
            MetadataKey::GrpcOut => "grpcOut",
            MetadataKey::TcpIn => "tcpIn",
            MetadataKey::TcpOut => "tcpOut",
            MetadataKey::Protocol => "protocol",
            MetadataKey::ResponseTime => "responseTime",
            MetadataKey::Throughput => "throughput",
            MetadataKey::IsMtls => "isMTLS",
            MetadataKey::SourcePrincipal => "sourcePrincipal",
            MetadataKey::DestPrincipal => "destPrincipal",
            MetadataKey::Aggregate => "aggregate",
            MetadataKey::AggregateValue => "aggregateValue",
            MetadataKey::DestServices => "destServices",
            MetadataKey::HasCircuitBreaker => "hasCircuitBreaker",
            MetadataKey::HasVirtualService => "hasVirtualService",
            MetadataKey::HasRequestRouting => "hasRequestRouting",
            MetadataKey::HasFaultInjection => "hasFaultInjection",
            MetadataKey::HasTrafficShifting => "hasTrafficShifting",
            MetadataKey::HasRequestTimeout => "hasRequestTimeout",
            MetadataKey::HasMirroring => "hasMirroring",
            MetadataKey::HasMtls => "hasMTLS",
            MetadataKey::HasMissingSidecars => "hasMissingSidecars",
            MetadataKey::HealthData => "healthData",
            MetadataKey::HealthDataApp => "healthDataApp",
            MetadataKey::IsDead => "isDead",
            MetadataKey::IsEgress => "isEgress",
            MetadataKey::IsInaccessible => "isInaccessible",
            MetadataKey::IsOutside => "isOutside",
            MetadataKey::IsRoot => "isRoot",
            MetadataKey::IsUnused => "isUnused",
        }
    }

    /// Node rate keys that count as traffic in or out of a node.
    pub const NODE_TRAFFIC_RATES: [MetadataKey; 6] = [
        MetadataKey::HttpIn,
        MetadataKey::HttpOut,
        MetadataKey::GrpcIn,
        MetadataKey::GrpcOut,
        MetadataKey::TcpIn,
        MetadataKey::TcpOut,
    ];

    /// Node rate keys that count inbound errors.
    pub const NODE_ERROR_RATES: [MetadataKey; 3] = [
        MetadataKey::HttpIn4xx,
        MetadataKey::HttpIn5xx,
        MetadataKey::GrpcInErr,
    ];

    /// All edge rate keys.
    pub const EDGE_RATES: [MetadataKey; 7] = [
        MetadataKey::Http,
        MetadataKey::Http3xx,
        MetadataKey::Http4xx,
        MetadataKey::Http5xx,
        MetadataKey::Grpc,
        MetadataKey::GrpcErr,
        MetadataKey::Tcp,
    ];
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetadataKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Float(f64),
    Text(String),
    Record(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            MetadataValue::Bool(_) => "bool",
            MetadataValue::Float(_) => "float",
            MetadataValue::Text(_) => "text",
            MetadataValue::Record(_) => "record",
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

/// Errors raised by typed metadata access
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetadataError {
    #[error("metadata key {key} holds a {found} value, expected {expected}")]
    TypeMismatch {
        key: MetadataKey,
        expected: &'static str,
        found: &'static str,
    },
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Metadata bag attached to a node or edge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(BTreeMap<MetadataKey, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: MetadataKey) -> Option<&MetadataValue> {
        self.0.get(&key)
    }

    pub fn contains(&self, key: MetadataKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn insert(&mut self, key: MetadataKey, value: impl Into<MetadataValue>) {
        self.0.insert(key, value.into());
    }

    pub fn remove(&mut self, key: MetadataKey) -> Option<MetadataValue> {
        self.0.remove(&key)
    }

    pub fn set_flag(&mut self, key: MetadataKey) {
        self.insert(key, true);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetadataKey, &MetadataValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn mismatch(key: MetadataKey, expected: &'static str, found: &MetadataValue) -> MetadataError {
        MetadataError::TypeMismatch {
            key,
            expected,
            found: found.shape(),
        }
    }

    pub fn float(&self, key: MetadataKey) -> MetadataResult<Option<f64>> {
        match self.0.get(&key) {
            None => Ok(None),
            Some(MetadataValue::Float(v)) => Ok(Some(*v)),
            Some(other) => Err(Self::mismatch(key, "float", other)),
        }
    }

    /// Rate stored under `key`, zero when absent.
    pub fn rate(&self, key: MetadataKey) -> MetadataResult<f64> {
        Ok(self.float(key)?.unwrap_or(0.0))
    }

    /// Boolean flag under `key`, false when absent.
    pub fn flag(&self, key: MetadataKey) -> MetadataResult<bool> {
        match self.0.get(&key) {
            None => Ok(false),
            Some(MetadataValue::Bool(v)) => Ok(*v),
            Some(other) => Err(Self::mismatch(key, "bool", other)),
        }
    }

    pub fn text(&self, key: MetadataKey) -> MetadataResult<Option<&str>> {
        match self.0.get(&key) {
            None => Ok(None),
            Some(MetadataValue::Text(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(Self::mismatch(key, "text", other)),
        }
    }

    pub fn record(&self, key: MetadataKey) -> MetadataResult<Option<&BTreeMap<String, MetadataValue>>> {
        match self.0.get(&key) {
            None => Ok(None),
            Some(MetadataValue::Record(v)) => Ok(Some(v)),
            Some(other) => Err(Self::mismatch(key, "record", other)),
        }
    }

    /// Record under `key`, created empty when absent.
    pub fn record_mut(&mut self, key: MetadataKey) -> MetadataResult<&mut BTreeMap<String, MetadataValue>> {
        let value = self
            .0
            .entry(key)
            .or_insert_with(|| MetadataValue::Record(BTreeMap::new()));
        match value {
            MetadataValue::Record(v) => Ok(v),
            other => Err(Self::mismatch(key, "record", other)),
        }
    }

    /// Add `value` to the float under `key`. Non-positive values are ignored.
    pub fn add_float(&mut self, key: MetadataKey, value: f64) -> MetadataResult<()> {
        if value <= 0.0 || !value.is_finite() {
            return Ok(());
        }
        match self.0.get_mut(&key) {
            None => {
                self.0.insert(key, MetadataValue::Float(value));
                Ok(())
            }
            Some(MetadataValue::Float(v)) => {
                *v += value;
                Ok(())
            }
            Some(other) => Err(Self::mismatch(key, "float", other)),
        }
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k.as_str(), v)?;
        }
        map.end()
    }
}
