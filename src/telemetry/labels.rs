//! Source and destination identity from telemetry labels

use crate::graph::NodeIdentity;
use crate::source::Sample;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("sample is missing label {0}")]
    Missing(&'static str),
}

/// Identities reconstructed from one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficLabels {
    pub source: NodeIdentity,
    pub dest: NodeIdentity,
}

fn required<'a>(sample: &'a Sample, name: &'static str) -> Result<&'a str, LabelError> {
    sample.label(name).ok_or(LabelError::Missing(name))
}

impl TrafficLabels {
    /// Parse identity labels from `sample`. Cluster labels are optional and
    /// default to `default_cluster`.
    pub fn parse(sample: &Sample, default_cluster: &str) -> Result<Self, LabelError> {
        let source = NodeIdentity {
            cluster: sample
                .label("source_cluster")
                .unwrap_or(default_cluster)
                .to_string(),
            service_namespace: String::new(),
            service: String::new(),
            workload_namespace: required(sample, "source_workload_namespace")?.to_string(),
            workload: required(sample, "source_workload")?.to_string(),
            app: required(sample, "source_app")?.to_string(),
            version: required(sample, "source_version")?.to_string(),
        };
        let dest = NodeIdentity {
            cluster: sample
                .label("destination_cluster")
                .unwrap_or(default_cluster)
                .to_string(),
            service_namespace: required(sample, "destination_service_namespace")?.to_string(),
            service: required(sample, "destination_service_name")?.to_string(),
            workload_namespace: required(sample, "destination_workload_namespace")?.to_string(),
            workload: required(sample, "destination_workload")?.to_string(),
            app: required(sample, "destination_app")?.to_string(),
            version: required(sample, "destination_version")?.to_string(),
        };
        Ok(Self { source, dest })
    }

    /// The service leg the destination was reached through.
    pub fn dest_service(&self) -> NodeIdentity {
        NodeIdentity::service(
            self.dest.cluster.clone(),
            self.dest.service_namespace.clone(),
            self.dest.service.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_label_is_reported() {
        let sample = Sample::new([("source_workload_namespace", "bookinfo")], 1.0);
        assert_eq!(
            TrafficLabels::parse(&sample, "east"),
            Err(LabelError::Missing("source_workload"))
        );
    }
}
