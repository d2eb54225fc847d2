//! Scoring and ranking of registered providers against a query.
//!
//! Selection runs in two phases:
//!
//! 1. hard filter — compliance tags, risk ceiling, and availability
//!    eliminate candidates entirely;
//! 2. soft ranking — survivors are ordered by
//!    `w_cost·(1/cost) + w_latency·(1/latency_ms) + w_health·bonus`,
//!    ties broken by provider id so tests and fallback order are
//!    deterministic.

use serde::Deserialize;
use tracing::debug;

use super::decision::{RejectReason, RoutingDecision};
use crate::providers::{HealthState, ProviderDescriptor};
use crate::telemetry;
use crate::types::Classification;

/// Weights for the soft ranking formula, plus the two priors it needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the inverse-cost term. Default: 1.0.
    #[serde(default = "default_weight")]
    pub cost: f64,
    /// Weight of the inverse-latency term. Default: 1.0.
    #[serde(default = "default_weight")]
    pub latency: f64,
    /// Weight of the health bonus term. Default: 1.0.
    #[serde(default = "default_weight")]
    pub health: f64,
    /// Health bonus factor for degraded providers (healthy scores 1.0).
    /// Default: 0.25.
    #[serde(default = "default_degraded_factor")]
    pub degraded_factor: f64,
    /// Latency assumed for providers with no observations yet, in
    /// milliseconds. Default: 250.
    #[serde(default = "default_latency_prior_ms")]
    pub latency_prior_ms: u64,
}

fn default_weight() -> f64 {
    1.0
}
fn default_degraded_factor() -> f64 {
    0.25
}
fn default_latency_prior_ms() -> u64 {
    250
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cost: default_weight(),
            latency: default_weight(),
            health: default_weight(),
            degraded_factor: default_degraded_factor(),
            latency_prior_ms: default_latency_prior_ms(),
        }
    }
}

impl ScoringWeights {
    /// Reject negative weights; a zero weight disables a term, which is
    /// legitimate.
    pub fn validate(&self) -> crate::Result<()> {
        if self.cost < 0.0 || self.latency < 0.0 || self.health < 0.0 {
            return Err(crate::BifrostError::Configuration(
                "scoring weights must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scores and ranks providers for one query.
pub struct ProviderSelector {
    weights: ScoringWeights,
}

impl ProviderSelector {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Produce a ranked fallback list from a registry snapshot.
    ///
    /// `required_tags` are the request's compliance requirements; every
    /// candidate must carry all of them. An empty decision means no
    /// provider is eligible and nothing must be dispatched.
    pub fn select(
        &self,
        classification: &Classification,
        required_tags: &[String],
        providers: &[ProviderDescriptor],
    ) -> RoutingDecision {
        let mut rejections = Vec::new();
        let mut scored: Vec<(f64, &ProviderDescriptor)> = Vec::new();

        for provider in providers {
            match self.hard_filter(classification, required_tags, provider) {
                Some(reason) => rejections.push((provider.id.clone(), reason)),
                None => scored.push((self.score(provider), provider)),
            }
        }

        // Descending score; equal scores fall back to ascending id.
        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let ranked: Vec<String> = scored.iter().map(|(_, p)| p.id.clone()).collect();
        if let Some(top) = ranked.first() {
            metrics::counter!(telemetry::PROVIDER_SELECTED_TOTAL, "provider" => top.clone())
                .increment(1);
        }
        debug!(?ranked, rejected = rejections.len(), "selection complete");

        RoutingDecision { ranked, rejections }
    }

    /// Elimination rules, applied before any scoring.
    fn hard_filter(
        &self,
        classification: &Classification,
        required_tags: &[String],
        provider: &ProviderDescriptor,
    ) -> Option<RejectReason> {
        if provider.health == HealthState::Unavailable {
            return Some(RejectReason::Unavailable);
        }
        if let Some(tag) = required_tags
            .iter()
            .find(|tag| !provider.compliance_tags.contains(*tag))
        {
            return Some(RejectReason::MissingComplianceTag(tag.clone()));
        }
        if provider.risk_ceiling < classification.risk_tier {
            return Some(RejectReason::RiskCeilingTooLow {
                ceiling: provider.risk_ceiling,
                required: classification.risk_tier,
            });
        }
        None
    }

    /// Weighted soft score. Cost is declared; latency comes from the
    /// rolling estimate or the configured prior; health contributes a
    /// bonus of 1.0 (healthy) or the degraded factor.
    fn score(&self, provider: &ProviderDescriptor) -> f64 {
        let latency_ms = provider
            .latency_estimate
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(self.weights.latency_prior_ms as f64)
            .max(1.0);
        let health_bonus = match provider.health {
            HealthState::Healthy => 1.0,
            HealthState::Degraded => self.weights.degraded_factor,
            // Unavailable never reaches scoring.
            HealthState::Unavailable => 0.0,
        };
        self.weights.cost / provider.cost_per_unit
            + self.weights.latency / latency_ms
            + self.weights.health * health_bonus
    }
}
