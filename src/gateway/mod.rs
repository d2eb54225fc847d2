//! The gateway: construction via [`BifrostBuilder`], request handling via
//! [`Bifrost::route`].
//!
//! A [`Bifrost`] instance is constructed once at process start and shared
//! by handle; every request flows through its single `route` entry point.

mod builder;
mod orchestrator;

pub use builder::BifrostBuilder;
pub use orchestrator::Bifrost;
