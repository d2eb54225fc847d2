//! Provider registry: the single source of truth for provider state.
//!
//! The registry owns one entry per backend: declared attributes from
//! configuration, the adapter handle, and the continuously updated
//! health and latency trackers. Every dispatch attempt reports its
//! outcome here via [`report_outcome`](ProviderRegistry::report_outcome);
//! the selector reads point-in-time snapshots via
//! [`descriptors`](ProviderRegistry::descriptors).
//!
//! Outcome reports use per-provider atomics and a per-provider lock, so
//! concurrent reports for different providers never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::descriptor::{HealthState, ProviderDescriptor};
use super::health::{HealthPolicy, HealthTracker};
use super::latency::LatencyTracker;
use super::traits::BackendAdapter;
use crate::config::ProviderConfig;
use crate::telemetry;
use crate::{BifrostError, Result};

struct ProviderEntry {
    config: ProviderConfig,
    adapter: Arc<dyn BackendAdapter>,
    latency: LatencyTracker,
    health: HealthTracker,
}

/// Registry of providers and their live health/latency state.
///
/// Constructed once at startup and shared by handle; all mutation goes
/// through its narrow synchronised methods.
pub struct ProviderRegistry {
    entries: HashMap<String, Arc<ProviderEntry>>,
    policy: HealthPolicy,
}

impl ProviderRegistry {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    /// Register a backend with its declared attributes.
    ///
    /// Fails on duplicate ids and non-positive cost; both are
    /// configuration mistakes that must abort startup.
    pub fn register(&mut self, config: ProviderConfig, adapter: Arc<dyn BackendAdapter>) -> Result<()> {
        if config.cost_per_unit <= 0.0 {
            return Err(BifrostError::Configuration(format!(
                "provider '{}' has non-positive cost_per_unit",
                config.id
            )));
        }
        if self.entries.contains_key(&config.id) {
            return Err(BifrostError::Configuration(format!(
                "duplicate provider id '{}'",
                config.id
            )));
        }
        let id = config.id.clone();
        metrics::gauge!(telemetry::PROVIDER_HEALTH_STATE, "provider" => id.clone())
            .set(HealthState::Healthy.gauge_value());
        self.entries.insert(
            id,
            Arc::new(ProviderEntry {
                config,
                adapter,
                latency: LatencyTracker::default(),
                health: HealthTracker::new(),
            }),
        );
        Ok(())
    }

    /// Point-in-time descriptor snapshot for the selector.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.entries
            .values()
            .map(|entry| ProviderDescriptor {
                id: entry.config.id.clone(),
                cost_per_unit: entry.config.cost_per_unit,
                compliance_tags: entry.config.compliance_tags.iter().cloned().collect(),
                risk_ceiling: entry.config.risk_ceiling,
                latency_estimate: entry.latency.estimate(),
                health: entry.health.effective_state(&self.policy),
            })
            .collect()
    }

    /// Adapter handle for a provider id.
    pub fn adapter(&self, id: &str) -> Option<Arc<dyn BackendAdapter>> {
        self.entries.get(id).map(|e| Arc::clone(&e.adapter))
    }

    /// Feed a dispatch outcome back into health and latency state.
    ///
    /// Latency is recorded for successful dispatches only; timeouts and
    /// failures would drag the estimate toward the timeout ceiling.
    pub fn report_outcome(&self, id: &str, success: bool, latency: Duration) {
        let Some(entry) = self.entries.get(id) else {
            return;
        };
        let transition = if success {
            entry.latency.record(latency);
            entry.health.record_success(&self.policy)
        } else {
            entry.health.record_failure(&self.policy)
        };
        if let Some(state) = transition {
            info!(provider = id, state = state.as_str(), "provider health transition");
            metrics::gauge!(telemetry::PROVIDER_HEALTH_STATE, "provider" => id.to_owned())
                .set(state.gauge_value());
        }
    }

    /// Raw (not cooldown-adjusted) health state, mainly for tests and
    /// introspection.
    pub fn health(&self, id: &str) -> Option<HealthState> {
        self.entries.get(id).map(|e| e.health.state())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered provider ids, sorted for deterministic output.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::types::{QueryContext, RiskTier};

    struct NullAdapter(&'static str);

    #[async_trait]
    impl BackendAdapter for NullAdapter {
        fn id(&self) -> &str {
            self.0
        }

        async fn invoke(&self, _text: &str, _context: &QueryContext) -> Result<String> {
            Ok(String::new())
        }
    }

    fn spec(id: &str) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            cost_per_unit: 1.0,
            compliance_tags: vec![],
            risk_ceiling: RiskTier::High,
        }
    }

    fn registry_with(ids: &[&'static str]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new(HealthPolicy::default());
        for id in ids {
            registry
                .register(spec(id), Arc::new(NullAdapter(id)))
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let mut registry = registry_with(&["a"]);
        let err = registry
            .register(spec("a"), Arc::new(NullAdapter("a")))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[tokio::test]
    async fn non_positive_cost_is_rejected() {
        let mut registry = ProviderRegistry::new(HealthPolicy::default());
        let mut bad = spec("a");
        bad.cost_per_unit = 0.0;
        assert!(registry.register(bad, Arc::new(NullAdapter("a"))).is_err());
    }

    #[tokio::test]
    async fn outcome_feedback_updates_latency_estimate() {
        let registry = registry_with(&["a"]);
        registry.report_outcome("a", true, Duration::from_millis(120));
        let descriptors = registry.descriptors();
        assert_eq!(
            descriptors[0].latency_estimate,
            Some(Duration::from_millis(120))
        );
    }

    #[tokio::test]
    async fn failures_do_not_touch_latency() {
        let registry = registry_with(&["a"]);
        registry.report_outcome("a", false, Duration::from_secs(30));
        assert_eq!(registry.descriptors()[0].latency_estimate, None);
    }

    #[tokio::test]
    async fn consecutive_failures_degrade_through_descriptors() {
        let registry = registry_with(&["a"]);
        for _ in 0..3 {
            registry.report_outcome("a", false, Duration::ZERO);
        }
        assert_eq!(registry.health("a"), Some(HealthState::Degraded));
        assert_eq!(registry.descriptors()[0].health, HealthState::Degraded);
    }

    #[tokio::test]
    async fn unknown_provider_outcome_is_ignored() {
        let registry = registry_with(&["a"]);
        registry.report_outcome("ghost", true, Duration::ZERO);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn provider_ids_are_sorted() {
        let registry = registry_with(&["b", "a", "c"]);
        assert_eq!(registry.provider_ids(), ["a", "b", "c"]);
    }
}
