//! Outcome of selection for one query.

use crate::types::RiskTier;

/// Why a provider was removed by the hard filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The provider lacks a compliance tag the request requires.
    MissingComplianceTag(String),
    /// The provider's risk tolerance ceiling is below the query's tier.
    RiskCeilingTooLow {
        ceiling: RiskTier,
        required: RiskTier,
    },
    /// The provider is currently unavailable.
    Unavailable,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingComplianceTag(tag) => {
                write!(f, "missing compliance tag '{tag}'")
            }
            RejectReason::RiskCeilingTooLow { ceiling, required } => write!(
                f,
                "risk ceiling {} below required {}",
                ceiling.as_str(),
                required.as_str()
            ),
            RejectReason::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Ranked fallback list plus the reasons skipped candidates were
/// rejected. Created per request; the orchestrator walks `ranked` in
/// order without recomputing selection.
#[derive(Debug, Clone, Default)]
pub struct RoutingDecision {
    /// Candidate provider ids, best first.
    pub ranked: Vec<String>,
    /// Providers eliminated by the hard filter, with reasons.
    pub rejections: Vec<(String, RejectReason)>,
}

impl RoutingDecision {
    /// True when no provider survived the hard filter.
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reasons_display() {
        assert_eq!(
            RejectReason::MissingComplianceTag("region-eu".into()).to_string(),
            "missing compliance tag 'region-eu'"
        );
        assert_eq!(
            RejectReason::RiskCeilingTooLow {
                ceiling: RiskTier::Low,
                required: RiskTier::High,
            }
            .to_string(),
            "risk ceiling low below required high"
        );
    }
}
