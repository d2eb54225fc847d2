//! The capability contract the core consumes from any backend.
//!
//! Adapters are registered at startup and invoked through this trait; the
//! core is agnostic to transport, authentication, and wire format. The
//! per-attempt timeout is applied by the orchestrator, not the adapter.

use async_trait::async_trait;

use crate::types::QueryContext;
use crate::Result;

/// One invokable backend.
///
/// Errors returned from [`invoke`](Self::invoke) advance the orchestrator
/// to the next ranked candidate; the adapter does not need to classify
/// them beyond producing a displayable error.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Stable adapter id. Must match the provider id it is registered
    /// under.
    fn id(&self) -> &str;

    /// Answer the query text. The returned string is the response
    /// payload stored in the cache and handed to the caller.
    async fn invoke(&self, text: &str, context: &QueryContext) -> Result<String>;
}
