//! Incoming query and its caller-supplied context.

use serde::{Deserialize, Serialize};

use super::classification::RiskTier;

/// How much the caller is trusted. Feeds the risk heuristics: lower
/// trust raises the derived risk tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Untrusted,
    #[default]
    Standard,
    Trusted,
}

/// Caller-supplied context accompanying a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    /// Trust level of the caller (default: standard).
    #[serde(default)]
    pub trust_level: TrustLevel,
    /// Compliance tags every serving provider must carry
    /// (e.g. "region-eu", "hipaa").
    #[serde(default)]
    pub compliance_requirements: Vec<String>,
    /// Opaque caller metadata. Participates in the cache fingerprint so
    /// that queries differing only in metadata do not share answers.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

/// A single request to be answered. Created per request, discarded after
/// the response is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Raw query text.
    pub text: String,
    /// Caller context.
    #[serde(default)]
    pub context: QueryContext,
    /// Caller-declared risk hint. May raise the derived risk tier but
    /// never lowers it.
    #[serde(default)]
    pub risk_hint: Option<RiskTier>,
}

impl Query {
    /// Convenience constructor for a query with default context.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: QueryContext::default(),
            risk_hint: None,
        }
    }

    /// Set the caller context.
    pub fn context(mut self, context: QueryContext) -> Self {
        self.context = context;
        self
    }

    /// Set the caller-declared risk hint.
    pub fn risk_hint(mut self, hint: RiskTier) -> Self {
        self.risk_hint = Some(hint);
        self
    }
}

impl QueryContext {
    /// Set the trust level.
    pub fn trust_level(mut self, level: TrustLevel) -> Self {
        self.trust_level = level;
        self
    }

    /// Add a required compliance tag.
    pub fn require(mut self, tag: impl Into<String>) -> Self {
        self.compliance_requirements.push(tag.into());
        self
    }
}
