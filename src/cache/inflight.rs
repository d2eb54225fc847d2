//! In-flight dispatch results shared between a leader and its followers.
//!
//! The coalescing contract: the leader's publish happens-before any
//! follower observes the result (the watch channel provides the
//! happens-before edge). A follower that is cancelled simply drops its
//! receiver; it never cancels the leader's dispatch.

use tokio::sync::watch;

use crate::routing::RejectReason;

/// Successful dispatch outcome shared with followers.
#[derive(Debug, Clone)]
pub struct FlightOutcome {
    /// The backend's answer payload.
    pub payload: String,
    /// Provider that produced it.
    pub provider: String,
}

/// Failed dispatch outcome shared with followers.
///
/// Cloneable summary of the leader's terminal error, so every follower
/// receives the same aggregated failure instead of retrying
/// independently.
#[derive(Debug, Clone)]
pub struct FlightFailure {
    /// Number of dispatch attempts the leader made.
    pub attempts: usize,
    /// Provider of the last attempt, or "none" when no dispatch happened.
    pub provider: String,
    /// Display form of the last error.
    pub message: String,
    /// True when the leader vanished without publishing, as opposed to
    /// publishing a genuine dispatch or routing failure.
    pub abandoned: bool,
    /// Per-provider rejection reasons when the leader's selection came
    /// back empty. Empty for dispatch failures.
    pub rejections: Vec<(String, RejectReason)>,
}

impl FlightFailure {
    pub fn new(attempts: usize, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attempts,
            provider: provider.into(),
            message: message.into(),
            abandoned: false,
            rejections: Vec::new(),
        }
    }

    /// Failure published when the leader found no eligible provider.
    pub fn rejected(
        rejections: Vec<(String, RejectReason)>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            attempts: 0,
            provider: "none".to_string(),
            message: message.into(),
            abandoned: false,
            rejections,
        }
    }

    /// Failure published when a leader vanishes without a result.
    pub(crate) fn abandoned() -> Self {
        Self {
            attempts: 0,
            provider: "none".to_string(),
            message: "in-flight dispatch abandoned by leader".to_string(),
            abandoned: true,
            rejections: Vec::new(),
        }
    }
}

/// What a follower observes once the leader publishes.
pub type FlightResult = std::result::Result<FlightOutcome, FlightFailure>;

/// Handle a follower awaits the leader's result on.
#[derive(Debug)]
pub struct ResultWaiter {
    rx: watch::Receiver<Option<FlightResult>>,
}

impl ResultWaiter {
    pub(crate) fn new(rx: watch::Receiver<Option<FlightResult>>) -> Self {
        Self { rx }
    }

    /// Wait for the leader to publish.
    ///
    /// Resolves to [`FlightFailure::abandoned`] if the leader disappears
    /// without publishing (the store's token drop guard makes this a
    /// last-resort path, not a normal one).
    pub async fn wait(mut self) -> FlightResult {
        match self.rx.wait_for(Option::is_some).await {
            Ok(value) => (*value)
                .clone()
                .unwrap_or_else(|| Err(FlightFailure::abandoned())),
            Err(_) => Err(FlightFailure::abandoned()),
        }
    }
}
