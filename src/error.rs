//! Bifrost error types

/// Bifrost error types
#[derive(Debug, thiserror::Error)]
pub enum BifrostError {
    // Routing errors
    /// No provider survived the hard constraint filter. Carries the
    /// per-provider rejection reasons so callers can see why.
    #[error("no eligible provider: {}", format_rejections(.rejections))]
    NoEligibleProvider {
        rejections: Vec<(String, crate::routing::RejectReason)>,
    },

    // Dispatch errors
    #[error("dispatch to '{provider}' timed out after {timeout:?}")]
    DispatchTimeout {
        provider: String,
        timeout: std::time::Duration,
    },

    #[error("dispatch to '{provider}' failed: {message}")]
    Dispatch { provider: String, message: String },

    /// The per-request deadline elapsed before any candidate succeeded.
    #[error("request deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded { attempts: usize },

    /// All ranked candidates were tried and failed. The aggregated error
    /// the caller sees: last failure plus attempt count.
    #[error("all {attempts} candidate(s) exhausted, last error: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<BifrostError>,
    },

    /// The coalescing leader abandoned the dispatch without publishing
    /// a result (task panic or cancellation with no waiters left).
    #[error("in-flight dispatch abandoned by leader")]
    LeaderAbandoned,

    // Configuration errors
    #[error("no provider registered")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BifrostError {
    /// Whether this error should advance the orchestrator to the next
    /// candidate in the fallback list rather than terminate the request.
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(
            self,
            BifrostError::DispatchTimeout { .. } | BifrostError::Dispatch { .. }
        )
    }
}

fn format_rejections(rejections: &[(String, crate::routing::RejectReason)]) -> String {
    if rejections.is_empty() {
        return "registry has no providers".to_string();
    }
    rejections
        .iter()
        .map(|(id, reason)| format!("{id}: {reason}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for Bifrost operations
pub type Result<T> = std::result::Result<T, BifrostError>;
