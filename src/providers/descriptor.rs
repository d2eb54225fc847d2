//! Declared provider attributes as seen by the selector.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::RiskTier;

/// Provider health, fed back from dispatch outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Full eligibility.
    Healthy,
    /// Reduced eligibility: still selectable, scored down.
    Degraded,
    /// Not selectable until the cooldown elapses.
    Unavailable,
}

impl HealthState {
    /// Stable label for metrics and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unavailable => "unavailable",
        }
    }

    /// Gauge encoding: 0 = healthy, 1 = degraded, 2 = unavailable.
    pub fn gauge_value(&self) -> f64 {
        match self {
            HealthState::Healthy => 0.0,
            HealthState::Degraded => 1.0,
            HealthState::Unavailable => 2.0,
        }
    }
}

/// Point-in-time snapshot of one provider's declared and observed
/// attributes. Produced by
/// [`ProviderRegistry::descriptors`](super::ProviderRegistry::descriptors)
/// and consumed by the selector; never mutated in place.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Stable provider id. Selection tie-breaks compare these.
    pub id: String,
    /// Declared cost per unit of work. Must be positive.
    pub cost_per_unit: f64,
    /// Compliance tags the provider satisfies.
    pub compliance_tags: HashSet<String>,
    /// Highest risk tier this provider may serve.
    pub risk_ceiling: RiskTier,
    /// Rolling latency estimate, absent until the first observation.
    pub latency_estimate: Option<Duration>,
    /// Effective health state. A provider that is unavailable but past
    /// its cooldown is reported degraded so it can receive a probe.
    pub health: HealthState,
}
