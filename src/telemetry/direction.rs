//! Traffic-direction partitioning of per-namespace queries
//!
//! Each namespace's telemetry is fetched in disjoint slices so that no
//! sample is reported twice: traffic with no known source, traffic entering
//! from other namespaces, traffic originating inside the namespace, and the
//! two slices crossing the infrastructure namespace boundary, which are only
//! requested when infrastructure traffic is included.

/// Labels every traffic query groups by.
pub const TRAFFIC_GROUP_BY: &str = "source_cluster,source_workload_namespace,source_workload,\
source_app,source_version,destination_cluster,destination_service_namespace,\
destination_service_name,destination_workload_namespace,destination_workload,\
destination_app,destination_version";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Direction {
    pub name: &'static str,
    /// Label matchers, without surrounding braces
    pub selector: String,
}

/// Selectors partitioning the traffic of `namespace`.
pub fn directions(namespace: &str, istio_namespace: &str, include_istio: bool) -> Vec<Direction> {
    let is_istio = namespace == istio_namespace;
    let mut out = vec![Direction {
        name: "unknown",
        selector: format!(
            r#"reporter="destination",source_workload="unknown",destination_service_namespace="{namespace}""#
        ),
    }];

    if is_istio {
        out.push(Direction {
            name: "outside",
            selector: format!(
                r#"reporter="source",source_workload_namespace!="{namespace}",destination_service_namespace="{namespace}""#
            ),
        });
        out.push(Direction {
            name: "inside",
            selector: format!(r#"reporter="source",source_workload_namespace="{namespace}""#),
        });
        return out;
    }

    out.push(Direction {
        name: "outside",
        selector: format!(
            r#"reporter="source",source_workload_namespace!~"{namespace}|{istio_namespace}",destination_service_namespace="{namespace}""#
        ),
    });
    out.push(Direction {
        name: "inside",
        selector: format!(
            r#"reporter="source",source_workload_namespace="{namespace}",destination_service_namespace!="{istio_namespace}""#
        ),
    });
    if include_istio {
        out.push(Direction {
            name: "fromIstio",
            selector: format!(
                r#"reporter="source",source_workload_namespace="{istio_namespace}",destination_service_namespace="{namespace}""#
            ),
        });
        out.push(Direction {
            name: "toIstio",
            selector: format!(
                r#"reporter="source",source_workload_namespace="{namespace}",destination_service_namespace="{istio_namespace}""#
            ),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_slices_only_when_included() {
        assert_eq!(directions("bookinfo", "istio-system", false).len(), 3);
        let all = directions("bookinfo", "istio-system", true);
        assert_eq!(all.len(), 5);
        assert!(all.iter().any(|d| d.name == "fromIstio"));
    }

    #[test]
    fn infrastructure_namespace_has_no_supplements() {
        let dirs = directions("istio-system", "istio-system", true);
        assert_eq!(dirs.len(), 3);
        assert!(dirs[2].selector.contains(r#"source_workload_namespace="istio-system""#));
    }
}
