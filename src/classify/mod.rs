//! Rule-based query classification.
//!
//! [`Classifier::classify`] derives a query's type, risk tier, and cache
//! fingerprint. Classification is deterministic for identical
//! (text, context, config version) so the same query always maps to the
//! same fingerprint — required for cache correctness.
//!
//! Classification never fails the request: a query the rules cannot
//! confidently type gets the generic type and the most conservative risk
//! tier, and the ambiguity is recorded as a metric.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Deserialize;
use tracing::debug;

use crate::telemetry;
use crate::types::{Classification, Fingerprint, Query, QueryType, RiskTier, TrustLevel};

/// Keywords that type a query as a review request.
const REVIEW_MARKERS: &[&str] = &["review", "critique", "proofread", "audit", "feedback on"];

/// Keywords that type a query as analytical.
const ANALYSIS_MARKERS: &[&str] = &[
    "analyze",
    "analyse",
    "analysis",
    "compare",
    "evaluate",
    "assess",
    "break down",
];

/// Markers for conversational turns.
const CONVERSATIONAL_MARKERS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "what's up", "how are you",
];

/// Default content markers that raise the risk tier to high.
const DEFAULT_SENSITIVE_MARKERS: &[&str] = &[
    "password",
    "api key",
    "secret",
    "ssn",
    "social security",
    "credit card",
    "medical record",
    "patient",
    "confidential",
];

/// Classifier configuration.
///
/// The `version` participates in the fingerprint so that rule changes
/// invalidate previously cached answers.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Configuration version, hashed into every fingerprint.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Content markers that force the high risk tier.
    #[serde(default = "default_sensitive_markers")]
    pub sensitive_markers: Vec<String>,
}

fn default_version() -> u32 {
    1
}

fn default_sensitive_markers() -> Vec<String> {
    DEFAULT_SENSITIVE_MARKERS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            sensitive_markers: default_sensitive_markers(),
        }
    }
}

/// Derives type, risk tier, and fingerprint for incoming queries.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a query. Infallible: ambiguous input degrades to the
    /// generic type and the most conservative risk tier.
    pub fn classify(&self, query: &Query) -> Classification {
        let normalised = normalise(&query.text);
        let fingerprint = self.fingerprint(&normalised, query);

        let (query_type, risk_tier) = if is_ambiguous(&normalised) {
            let fallback = QueryType::Generation;
            metrics::counter!(telemetry::CLASSIFICATION_AMBIGUOUS_TOTAL,
                "query_type" => fallback.as_str(),
            )
            .increment(1);
            debug!(%fingerprint, "ambiguous query, defaulting to conservative classification");
            (fallback, RiskTier::High)
        } else {
            (self.derive_type(&normalised), self.derive_risk(&normalised, query))
        };

        Classification {
            query_type,
            risk_tier,
            fingerprint,
        }
    }

    /// Assign a query type from keyword rules. Generation is the generic
    /// fallback when no rule matches.
    fn derive_type(&self, normalised: &str) -> QueryType {
        if REVIEW_MARKERS.iter().any(|m| normalised.contains(m)) {
            return QueryType::Review;
        }
        if ANALYSIS_MARKERS.iter().any(|m| normalised.contains(m)) {
            return QueryType::Analysis;
        }
        if CONVERSATIONAL_MARKERS
            .iter()
            .any(|m| normalised == *m || normalised.starts_with(&format!("{m} ")))
        {
            return QueryType::Conversational;
        }
        QueryType::Generation
    }

    /// Derive the risk tier from content features, caller trust, and the
    /// caller's hint. The hint may raise the tier but never lowers it.
    fn derive_risk(&self, normalised: &str, query: &Query) -> RiskTier {
        let mut tier = RiskTier::Low;

        if self
            .config
            .sensitive_markers
            .iter()
            .any(|m| normalised.contains(m.as_str()))
        {
            tier = RiskTier::High;
        }

        // Untrusted callers and compliance-scoped requests are at least medium.
        if query.context.trust_level == TrustLevel::Untrusted
            || !query.context.compliance_requirements.is_empty()
        {
            tier = tier.max(RiskTier::Medium);
        }

        if let Some(hint) = query.risk_hint {
            tier = tier.max(hint);
        }

        tier
    }

    /// Stable hash over normalised text + relevant context + config version.
    ///
    /// The caller's risk hint is deliberately excluded: it influences
    /// routing, not the answer, so hinted and unhinted queries share
    /// cache entries.
    fn fingerprint(&self, normalised: &str, query: &Query) -> Fingerprint {
        let mut hasher = DefaultHasher::new();
        self.config.version.hash(&mut hasher);
        normalised.hash(&mut hasher);
        query.context.trust_level.hash(&mut hasher);
        let mut tags = query.context.compliance_requirements.clone();
        tags.sort();
        tags.dedup();
        tags.hash(&mut hasher);
        if !query.context.metadata.is_null() {
            query.context.metadata.to_string().hash(&mut hasher);
        }
        Fingerprint(hasher.finish())
    }
}

/// Normalise query text: trim, lowercase, collapse internal whitespace.
fn normalise(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A query is ambiguous when no meaningful content survives normalisation.
fn is_ambiguous(normalised: &str) -> bool {
    !normalised.chars().any(|c| c.is_alphanumeric())
}
