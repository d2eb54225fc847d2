//! Telemetry metric name constants.
//!
//! Centralised metric names for bifrost operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `bifrost_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`), gauges carry the
//! current value of a state.
//!
//! # Common labels
//!
//! - `provider` — provider id (e.g. "fast-eu", "cheap-us")
//! - `query_type` — classified query type (e.g. "generation", "analysis")
//! - `status` — outcome: "ok" or "error"

/// Total requests handled by the orchestrator.
///
/// Labels: `provider` ("cache" for hits, "none" on routing failure),
/// `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "bifrost_requests_total";

/// End-to-end request duration in seconds.
///
/// Labels: `provider`, `status`.
pub const REQUEST_DURATION_SECONDS: &str = "bifrost_request_duration_seconds";

/// Per-attempt dispatch duration in seconds.
///
/// Labels: `provider`.
pub const DISPATCH_DURATION_SECONDS: &str = "bifrost_dispatch_duration_seconds";

/// Total dispatch attempts, including fallback attempts.
///
/// Labels: `provider`, `status` ("ok" | "error" | "timeout").
pub const DISPATCH_ATTEMPTS_TOTAL: &str = "bifrost_dispatch_attempts_total";

/// Total times each provider was chosen as the top-ranked candidate.
///
/// Labels: `provider`.
pub const PROVIDER_SELECTED_TOTAL: &str = "bifrost_provider_selected_total";

/// Current provider health state as a gauge.
///
/// Values: 0 = healthy, 1 = degraded, 2 = unavailable.
/// Labels: `provider`.
pub const PROVIDER_HEALTH_STATE: &str = "bifrost_provider_health_state";

/// Total cache hits.
pub const CACHE_HITS_TOTAL: &str = "bifrost_cache_hits_total";

/// Total cache misses (includes expired and corrupt entries).
pub const CACHE_MISSES_TOTAL: &str = "bifrost_cache_misses_total";

/// Total entries evicted to keep the cache within capacity.
pub const CACHE_EVICTIONS_TOTAL: &str = "bifrost_cache_evictions_total";

/// Total requests that waited on another request's in-flight dispatch
/// instead of dispatching themselves.
pub const COALESCED_WAITERS_TOTAL: &str = "bifrost_coalesced_waiters_total";

/// Total queries the classifier could not confidently type.
///
/// Labels: `query_type` (the conservative fallback assigned).
pub const CLASSIFICATION_AMBIGUOUS_TOTAL: &str = "bifrost_classification_ambiguous_total";
