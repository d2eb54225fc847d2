//! Response returned to the caller.

use serde::{Deserialize, Serialize};

/// Whether the response payload came from the cache or a fresh dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// The answer to a [`Query`](crate::Query).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    /// The backend's answer payload.
    pub payload: String,
    /// Id of the provider that produced the payload. For cache hits this
    /// is the provider that produced the original entry.
    pub provider_used: String,
    /// Hit or miss.
    pub cache_status: CacheStatus,
    /// End-to-end latency observed by the orchestrator, in milliseconds.
    pub latency_ms: u64,
}
