//! Connection security decoration of edges

use super::fusion::directional_samples;
use super::traits::{Appender, AppenderResult};
use crate::graph::{is_ok, GlobalInfo, MetadataKey, NamespaceInfo, TrafficMap};
use crate::telemetry::{EdgeValueMap, JoinPlan, TRAFFIC_GROUP_BY};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

pub const NAME: &str = "securityPolicy";

const MUTUAL_TLS: &str = "mutual_tls";

#[derive(Debug, Clone, Default)]
struct PolicyRates {
    rates: BTreeMap<String, f64>,
    source_principal: Option<String>,
    dest_principal: Option<String>,
}

impl PolicyRates {
    fn mtls_percentage(&self) -> Option<f64> {
        let mtls = self.rates.get(MUTUAL_TLS).copied().unwrap_or(0.0);
        if mtls <= 0.0 {
            return None;
        }
        let other: f64 = self
            .rates
            .iter()
            .filter(|(p, _)| p.as_str() != MUTUAL_TLS)
            .map(|(_, r)| r)
            .sum();
        Some(mtls / (mtls + other) * 100.0)
    }
}

/// Attaches `isMTLS` (percentage of traffic using mutual TLS) and the
/// source/destination principals to edges.
#[derive(Debug, Clone)]
pub struct SecurityPolicyAppender {
    pub plan: JoinPlan,
    pub include_istio: bool,
}

impl SecurityPolicyAppender {
    pub fn new(plan: JoinPlan, include_istio: bool) -> Self {
        Self { plan, include_istio }
    }
}

#[async_trait]
impl Appender for SecurityPolicyAppender {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn append_graph(
        &self,
        traffic: &mut TrafficMap,
        global: &mut GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> AppenderResult {
        if traffic.is_empty() {
            return Ok(());
        }
        let secs = namespace.duration_secs();
        let group_by = format!(
            "{TRAFFIC_GROUP_BY},connection_security_policy,source_principal,destination_principal"
        );

        let mut passes = Vec::new();
        for metric in ["istio_requests_total", "istio_tcp_sent_bytes_total"] {
            passes.extend(
                directional_samples(global, namespace, self.include_istio, |d| {
                    format!(
                        "sum(rate({metric}{{{}}}[{secs}s])) by ({group_by}) > 0",
                        d.selector
                    )
                })
                .await?,
            );
        }

        let mut policies: EdgeValueMap<PolicyRates> = EdgeValueMap::new();
        for samples in &passes {
            let mut pass: EdgeValueMap<PolicyRates> = EdgeValueMap::new();
            for (key, sample) in self.plan.keys(samples) {
                let entry = pass.get_or_insert_with(key, PolicyRates::default);
                let policy = sample
                    .label("connection_security_policy")
                    .unwrap_or("unknown")
                    .to_string();
                *entry.rates.entry(policy).or_insert(0.0) += sample.value;
                if let Some(p) = sample.label("source_principal").filter(|p| is_ok(p)) {
                    entry.source_principal = Some(p.to_string());
                }
                if let Some(p) = sample.label("destination_principal").filter(|p| is_ok(p)) {
                    entry.dest_principal = Some(p.to_string());
                }
            }
            // later passes overwrite the rate of the same policy
            policies.absorb(pass, |total, pass| {
                total.rates.extend(pass.rates);
                if pass.source_principal.is_some() {
                    total.source_principal = pass.source_principal;
                }
                if pass.dest_principal.is_some() {
                    total.dest_principal = pass.dest_principal;
                }
            });
        }

        let decorated = policies.decorate(traffic, |edge, rates| {
            if let Some(pct) = rates.mtls_percentage() {
                edge.metadata.insert(MetadataKey::IsMtls, pct);
            }
            if let Some(p) = &rates.source_principal {
                edge.metadata.insert(MetadataKey::SourcePrincipal, p.as_str());
            }
            if let Some(p) = &rates.dest_principal {
                edge.metadata.insert(MetadataKey::DestPrincipal, p.as_str());
            }
            Ok(())
        })?;
        debug!(namespace = %namespace.name, keys = policies.len(), decorated, "security policies applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtls_percentage_of_total() {
        let mut rates = PolicyRates::default();
        rates.rates.insert(MUTUAL_TLS.into(), 3.0);
        rates.rates.insert("none".into(), 1.0);
        assert_eq!(rates.mtls_percentage(), Some(75.0));

        rates.rates.insert(MUTUAL_TLS.into(), 0.0);
        assert_eq!(rates.mtls_percentage(), None);
    }
}
