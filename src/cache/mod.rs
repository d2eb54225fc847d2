//! Bounded response cache with TTL, LRU eviction, and in-flight coalescing.
//!
//! [`CacheStore`] owns all cached answers. It enforces two invariants the
//! orchestrator relies on:
//!
//! - a fingerprint maps to at most one entry, and the store never holds
//!   more than `capacity` entries — an insert that would exceed capacity
//!   evicts least-recently-used entries first (expired entries go before
//!   any live one, and equal recency breaks toward the earlier insert);
//! - at most one upstream dispatch is in flight per fingerprint. The
//!   first request to miss becomes the *leader* and receives a
//!   [`PublishToken`]; concurrent requests for the same fingerprint become
//!   *followers* and wait on the leader's published result.
//!
//! Expiry is lazy: an expired entry found by `get` is removed and counted
//! as a miss. [`CacheStore::sweep_expired`] exists for periodic
//! maintenance but is not required for correctness.
//!
//! Cache hit/miss/eviction metrics are emitted inside the store, so every
//! caller path is covered.

mod inflight;
mod store;

pub use inflight::{FlightFailure, FlightOutcome, FlightResult, ResultWaiter};
pub use store::{CacheStore, PublishToken, Reservation};

use std::time::Duration;

use serde::Deserialize;

use crate::types::QueryType;

/// Per-query-type time-to-live table.
///
/// Volatile conversational answers expire quickly; stable analytical
/// answers live longest.
#[derive(Debug, Clone, Deserialize)]
pub struct TtlTable {
    /// TTL for generation queries. Default: 5 minutes.
    #[serde(default = "default_generation_ttl", with = "secs")]
    pub generation: Duration,
    /// TTL for review queries. Default: 10 minutes.
    #[serde(default = "default_review_ttl", with = "secs")]
    pub review: Duration,
    /// TTL for analysis queries. Default: 30 minutes.
    #[serde(default = "default_analysis_ttl", with = "secs")]
    pub analysis: Duration,
    /// TTL for conversational queries. Default: 60 seconds.
    #[serde(default = "default_conversational_ttl", with = "secs")]
    pub conversational: Duration,
}

/// Serde helper: durations appear in config as integer seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

fn default_generation_ttl() -> Duration {
    Duration::from_secs(300)
}
fn default_review_ttl() -> Duration {
    Duration::from_secs(600)
}
fn default_analysis_ttl() -> Duration {
    Duration::from_secs(1800)
}
fn default_conversational_ttl() -> Duration {
    Duration::from_secs(60)
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            generation: default_generation_ttl(),
            review: default_review_ttl(),
            analysis: default_analysis_ttl(),
            conversational: default_conversational_ttl(),
        }
    }
}

impl TtlTable {
    /// TTL for a given query type.
    pub fn ttl_for(&self, query_type: QueryType) -> Duration {
        match query_type {
            QueryType::Generation => self.generation,
            QueryType::Review => self.review,
            QueryType::Analysis => self.analysis,
            QueryType::Conversational => self.conversational,
        }
    }
}

/// Configuration for the cache store.
///
/// ```rust
/// # use bifrost::CacheConfig;
/// let config = CacheConfig::new().capacity(4096);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 1024.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Per-query-type TTLs.
    #[serde(default)]
    pub ttl: TtlTable,
}

fn default_capacity() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl: TtlTable::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }

    /// Set the TTL table.
    pub fn ttl(mut self, table: TtlTable) -> Self {
        self.ttl = table;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_table_defaults_order_volatile_before_stable() {
        let table = TtlTable::default();
        assert!(table.conversational < table.generation);
        assert!(table.generation < table.review);
        assert!(table.review < table.analysis);
    }

    #[test]
    fn ttl_table_lookup() {
        let table = TtlTable::default();
        assert_eq!(
            table.ttl_for(QueryType::Conversational),
            Duration::from_secs(60)
        );
        assert_eq!(table.ttl_for(QueryType::Analysis), Duration::from_secs(1800));
    }
}
