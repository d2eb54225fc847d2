//! Derived facts about a query: type, risk tier, cache fingerprint.

use serde::{Deserialize, Serialize};

/// The fixed set of query types the classifier can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Open-ended content creation. The generic fallback type.
    Generation,
    /// Critique of supplied material (code review, proofreading).
    Review,
    /// Analytical or computational questions over stable inputs.
    Analysis,
    /// Dialogue turns whose answers go stale quickly.
    Conversational,
}

impl QueryType {
    /// Stable label for metrics and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Generation => "generation",
            QueryType::Review => "review",
            QueryType::Analysis => "analysis",
            QueryType::Conversational => "conversational",
        }
    }
}

/// Risk tier of a query. Ordered: `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Stable label for metrics and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

/// Stable cache key derived from normalised query text and context.
///
/// Deterministic within a process lifetime, which is the lifetime of the
/// in-memory cache it keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Immutable classification of a query, computed once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub query_type: QueryType,
    pub risk_tier: RiskTier,
    pub fingerprint: Fingerprint,
}
