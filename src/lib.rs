//! Bifrost - routing and caching layer for interchangeable LLM backends
//!
//! This crate sits in front of a set of backend adapters and decides,
//! per query, whether to answer from cache and which backend to dispatch
//! to. Selection weighs cost, observed latency, and live health against
//! the query's compliance and risk constraints; identical concurrent
//! queries coalesce onto a single upstream dispatch.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bifrost::{BackendAdapter, Bifrost, ProviderConfig, Query, RiskTier};
//!
//! # fn echo_adapter() -> Arc<dyn BackendAdapter> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> bifrost::Result<()> {
//!     let gateway = Bifrost::builder()
//!         .provider(
//!             ProviderConfig {
//!                 id: "fast-eu".into(),
//!                 cost_per_unit: 2.5,
//!                 compliance_tags: vec!["region-eu".into()],
//!                 risk_ceiling: RiskTier::High,
//!             },
//!             echo_adapter(),
//!         )
//!         .build()?;
//!
//!     let response = gateway.route(Query::new("sum VAT")).await?;
//!     println!("{} (from {})", response.payload, response.provider_used);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod routing;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStore, TtlTable};
pub use classify::{Classifier, ClassifierConfig};
pub use config::{Config, DispatchConfig, ProviderConfig};
pub use error::{BifrostError, Result};
pub use gateway::{Bifrost, BifrostBuilder};
pub use providers::{
    BackendAdapter, HealthPolicy, HealthState, ProviderDescriptor, ProviderRegistry,
};
pub use routing::{ProviderSelector, RejectReason, RoutingDecision, ScoringWeights};
pub use types::{
    CacheStatus, Classification, Fingerprint, Query, QueryContext, QueryType, RiskTier,
    RouteResponse, TrustLevel,
};
