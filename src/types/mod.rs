//! Core types shared across the gateway.

pub mod classification;
pub mod query;
pub mod response;

pub use classification::{Classification, Fingerprint, QueryType, RiskTier};
pub use query::{Query, QueryContext, TrustLevel};
pub use response::{CacheStatus, RouteResponse};
