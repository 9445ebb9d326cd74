//! Protocol rate bookkeeping on nodes and edges

use crate::graph::{MetadataKey, MetadataResult, NodeId, TrafficMap};
use crate::source::Sample;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Grpc,
    Http,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Grpc => "grpc",
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
        }
    }

    /// Protocol of a request sample, from its `request_protocol` label.
    pub fn from_request_label(label: Option<&str>) -> Option<Protocol> {
        match label {
            Some("grpc") => Some(Protocol::Grpc),
            Some("http") | None => Some(Protocol::Http),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response classification of a request sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Ok,
    Redirect,
    ClientError,
    ServerError,
}

impl ResponseClass {
    /// Classify an HTTP response code. A missing code means the request
    /// never completed and counts as a server error.
    pub fn from_http_code(code: &str) -> Self {
        match code.chars().next() {
            Some('3') => ResponseClass::Redirect,
            Some('4') => ResponseClass::ClientError,
            Some('5') | Some('-') => ResponseClass::ServerError,
            _ => ResponseClass::Ok,
        }
    }

    /// Classify a gRPC status; anything but `0` is an error.
    pub fn from_grpc_status(status: &str) -> Self {
        if status == "0" || status.is_empty() {
            ResponseClass::Ok
        } else {
            ResponseClass::ServerError
        }
    }
}

/// Protocol and response class of a request sample, or `None` when its
/// protocol is not supported.
pub fn classify_request(sample: &Sample) -> Option<(Protocol, ResponseClass)> {
    let protocol = Protocol::from_request_label(sample.label("request_protocol"))?;
    let class = match protocol {
        Protocol::Grpc => ResponseClass::from_grpc_status(sample.label("grpc_response_status").unwrap_or("0")),
        _ => ResponseClass::from_http_code(sample.label("response_code").unwrap_or("200")),
    };
    Some((protocol, class))
}

/// Endpoint nodes whose rates a recorded request updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSides {
    Both,
    Source,
    Dest,
}

/// Add `value` of traffic from `source` to `dest` to node and edge rates.
///
/// Both nodes must already be in the map; the edge is created if missing.
/// Non-positive values are ignored.
pub fn record_traffic(
    traffic: &mut TrafficMap,
    source: &NodeId,
    dest: &NodeId,
    protocol: Protocol,
    class: ResponseClass,
    value: f64,
) -> MetadataResult<()> {
    record_traffic_on(traffic, source, dest, protocol, class, value, RateSides::Both)
}

/// [`record_traffic`], restricted to the node rates of `sides`. The edge is
/// always updated.
pub fn record_traffic_on(
    traffic: &mut TrafficMap,
    source: &NodeId,
    dest: &NodeId,
    protocol: Protocol,
    class: ResponseClass,
    value: f64,
    sides: RateSides,
) -> MetadataResult<()> {
    if value <= 0.0 {
        return Ok(());
    }

    let (out_key, in_key, edge_key) = match protocol {
        Protocol::Grpc => (MetadataKey::GrpcOut, MetadataKey::GrpcIn, MetadataKey::Grpc),
        Protocol::Http => (MetadataKey::HttpOut, MetadataKey::HttpIn, MetadataKey::Http),
        Protocol::Tcp => (MetadataKey::TcpOut, MetadataKey::TcpIn, MetadataKey::Tcp),
    };
    let error_keys = match (protocol, class) {
        (Protocol::Http, ResponseClass::Redirect) => Some((MetadataKey::HttpIn3xx, MetadataKey::Http3xx)),
        (Protocol::Http, ResponseClass::ClientError) => Some((MetadataKey::HttpIn4xx, MetadataKey::Http4xx)),
        (Protocol::Http, ResponseClass::ServerError) => Some((MetadataKey::HttpIn5xx, MetadataKey::Http5xx)),
        (Protocol::Grpc, ResponseClass::ServerError | ResponseClass::ClientError) => {
            Some((MetadataKey::GrpcInErr, MetadataKey::GrpcErr))
        }
        _ => None,
    };

    if let Some(node) = traffic.get_mut(source) {
        if sides != RateSides::Dest {
            node.metadata.add_float(out_key, value)?;
        }
        let edge = node.add_edge(dest);
        if !edge.metadata.contains(MetadataKey::Protocol) {
            edge.metadata.insert(MetadataKey::Protocol, protocol.as_str());
        }
        edge.metadata.add_float(edge_key, value)?;
        if let Some((_, edge_err)) = error_keys {
            edge.metadata.add_float(edge_err, value)?;
        }
    }
    if sides == RateSides::Source {
        return Ok(());
    }
    if let Some(node) = traffic.get_mut(dest) {
        node.metadata.add_float(in_key, value)?;
        if let Some((node_err, _)) = error_keys {
            node.metadata.add_float(node_err, value)?;
        }
    }
    Ok(())
}
