//! Backend providers: the adapter capability trait, declared provider
//! attributes, health tracking, and the registry that owns them.

pub mod descriptor;
pub mod health;
pub mod latency;
pub mod registry;
pub mod traits;

pub use descriptor::{HealthState, ProviderDescriptor};
pub use health::HealthPolicy;
pub use latency::LatencyTracker;
pub use registry::ProviderRegistry;
pub use traits::BackendAdapter;
