//! Provider selection: hard constraint filtering and weighted soft
//! ranking over registry snapshots.

pub mod decision;
pub mod selector;

pub use decision::{RejectReason, RoutingDecision};
pub use selector::{ProviderSelector, ScoringWeights};
