//! Per-request orchestration: classify → cache check → select → dispatch
//! → record.
//!
//! Cancellation: a follower that stops waiting never cancels the leader's
//! dispatch. The leader's dispatch runs on a detached task, so it
//! survives its own caller's cancellation as long as any follower is
//! still waiting; with no followers left it abandons between attempts.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, FlightFailure, FlightOutcome, PublishToken, Reservation};
use crate::classify::Classifier;
use crate::config::DispatchConfig;
use crate::providers::ProviderRegistry;
use crate::routing::ProviderSelector;
use crate::telemetry;
use crate::types::{CacheStatus, Classification, Query, QueryContext, RouteResponse};
use crate::{BifrostError, Result};

/// The gateway. Constructed once via [`Bifrost::builder`], then shared.
pub struct Bifrost {
    classifier: Classifier,
    cache: Arc<CacheStore>,
    registry: Arc<ProviderRegistry>,
    selector: ProviderSelector,
    dispatch: DispatchConfig,
}

// Manual impl: the cache and selector hold no Debug representations
// worth printing; the provider set and dispatch budgets are what identify
// a gateway instance.
impl std::fmt::Debug for Bifrost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bifrost")
            .field("providers", &self.registry.provider_ids())
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

impl Bifrost {
    pub fn builder() -> super::BifrostBuilder {
        super::BifrostBuilder::new()
    }

    pub(crate) fn from_parts(
        classifier: Classifier,
        cache: Arc<CacheStore>,
        registry: Arc<ProviderRegistry>,
        selector: ProviderSelector,
        dispatch: DispatchConfig,
    ) -> Self {
        Self {
            classifier,
            cache,
            registry,
            selector,
            dispatch,
        }
    }

    /// Registry handle, for health introspection and external probes.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Remove expired cache entries; returns how many were removed.
    /// Call from a periodic maintenance task.
    pub fn sweep_expired(&self) -> usize {
        self.cache.sweep_expired()
    }

    /// Answer one query.
    pub async fn route(&self, query: Query) -> Result<RouteResponse> {
        let start = Instant::now();
        let classification = self.classifier.classify(&query);
        debug!(
            fingerprint = %classification.fingerprint,
            query_type = classification.query_type.as_str(),
            risk_tier = classification.risk_tier.as_str(),
            "query classified"
        );

        if let Some((payload, provider)) = self.cache.get(classification.fingerprint) {
            return Ok(respond(start, payload, provider, CacheStatus::Hit));
        }

        match self
            .cache
            .reserve(classification.fingerprint, classification.query_type)
        {
            Reservation::Cached { payload, provider } => {
                Ok(respond(start, payload, provider, CacheStatus::Hit))
            }
            Reservation::Follower(waiter) => match waiter.wait().await {
                Ok(outcome) => Ok(respond(start, outcome.payload, outcome.provider, CacheStatus::Miss)),
                Err(failure) => {
                    record_request("none", "error", start);
                    Err(follower_error(failure))
                }
            },
            Reservation::Leader(token) => self.lead(start, query, classification, token).await,
        }
    }

    /// Leader path: select candidates and run the fallback cascade on a
    /// detached task, publishing the outcome to any followers.
    async fn lead(
        &self,
        start: Instant,
        query: Query,
        classification: Classification,
        token: PublishToken,
    ) -> Result<RouteResponse> {
        let decision = self.selector.select(
            &classification,
            &query.context.compliance_requirements,
            &self.registry.descriptors(),
        );

        if decision.is_empty() {
            let err = BifrostError::NoEligibleProvider {
                rejections: decision.rejections.clone(),
            };
            warn!(fingerprint = %classification.fingerprint, %err, "no eligible provider");
            self.cache.publish(
                token,
                Err(FlightFailure::rejected(decision.rejections, err.to_string())),
            );
            record_request("none", "error", start);
            return Err(err);
        }

        let cascade = Cascade {
            cache: Arc::clone(&self.cache),
            registry: Arc::clone(&self.registry),
            ranked: decision.ranked,
            text: query.text,
            context: query.context,
            attempt_timeout: self.dispatch.attempt_timeout,
            deadline: start + self.dispatch.request_deadline,
        };
        let (caller_tx, caller_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(cascade.run(token, caller_tx));
        // Dropping this receiver is how the detached task learns the
        // caller has gone away.
        let _caller_probe = caller_rx;

        match handle.await {
            Ok(Ok(outcome)) => Ok(respond(start, outcome.payload, outcome.provider, CacheStatus::Miss)),
            Ok(Err(err)) => {
                record_request("none", "error", start);
                Err(err)
            }
            Err(join_err) => {
                warn!(%join_err, "dispatch task failed");
                record_request("none", "error", start);
                Err(BifrostError::LeaderAbandoned)
            }
        }
    }
}

/// One leader's fallback cascade, detached from its caller.
struct Cascade {
    cache: Arc<CacheStore>,
    registry: Arc<ProviderRegistry>,
    ranked: Vec<String>,
    text: String,
    context: QueryContext,
    attempt_timeout: std::time::Duration,
    deadline: Instant,
}

impl Cascade {
    async fn run(
        self,
        token: PublishToken,
        caller: oneshot::Sender<()>,
    ) -> Result<FlightOutcome> {
        let mut attempts = 0usize;
        let mut last_err: Option<BifrostError> = None;

        for id in &self.ranked {
            // With no caller and no followers there is nobody to serve.
            if caller.is_closed() && !token.has_followers() {
                debug!("caller gone and no followers, abandoning cascade");
                drop(token);
                return Err(BifrostError::LeaderAbandoned);
            }

            let now = Instant::now();
            if now >= self.deadline {
                let err = BifrostError::DeadlineExceeded { attempts };
                let provider = last_err
                    .as_ref()
                    .map(error_provider)
                    .unwrap_or_else(|| "none".to_string());
                self.cache
                    .publish(token, Err(FlightFailure::new(attempts, provider, err.to_string())));
                return Err(err);
            }

            let Some(adapter) = self.registry.adapter(id) else {
                continue;
            };
            attempts += 1;
            let budget = self.attempt_timeout.min(self.deadline - now);
            let attempt_start = Instant::now();
            let result = timeout(budget, adapter.invoke(&self.text, &self.context)).await;
            let elapsed = attempt_start.elapsed();

            match result {
                Ok(Ok(payload)) => {
                    self.registry.report_outcome(id, true, elapsed);
                    metrics::counter!(telemetry::DISPATCH_ATTEMPTS_TOTAL,
                        "provider" => id.clone(), "status" => "ok",
                    )
                    .increment(1);
                    metrics::histogram!(telemetry::DISPATCH_DURATION_SECONDS,
                        "provider" => id.clone(),
                    )
                    .record(elapsed.as_secs_f64());
                    info!(provider = %id, attempts, "dispatch succeeded");

                    let outcome = FlightOutcome {
                        payload,
                        provider: id.clone(),
                    };
                    self.cache.publish(token, Ok(outcome.clone()));
                    return Ok(outcome);
                }
                Ok(Err(err)) => {
                    self.registry.report_outcome(id, false, elapsed);
                    metrics::counter!(telemetry::DISPATCH_ATTEMPTS_TOTAL,
                        "provider" => id.clone(), "status" => "error",
                    )
                    .increment(1);
                    warn!(provider = %id, %err, "dispatch attempt failed, trying next candidate");
                    last_err = Some(BifrostError::Dispatch {
                        provider: id.clone(),
                        message: err.to_string(),
                    });
                }
                Err(_) => {
                    self.registry.report_outcome(id, false, budget);
                    metrics::counter!(telemetry::DISPATCH_ATTEMPTS_TOTAL,
                        "provider" => id.clone(), "status" => "timeout",
                    )
                    .increment(1);
                    warn!(provider = %id, timeout = ?budget, "dispatch attempt timed out");
                    last_err = Some(BifrostError::DispatchTimeout {
                        provider: id.clone(),
                        timeout: budget,
                    });
                }
            }
        }

        let last = match last_err {
            Some(err) => err,
            // Ranked ids always resolve to adapters; this arm guards the
            // registry and ranking drifting apart.
            None => BifrostError::NoProvider,
        };
        warn!(attempts, %last, "all candidates exhausted");
        let failure = FlightFailure::new(attempts, error_provider(&last), last.to_string());
        self.cache.publish(token, Err(failure));
        Err(BifrostError::Exhausted {
            attempts,
            last: Box::new(last),
        })
    }
}

/// Provider named by a dispatch error, "none" for everything else.
fn error_provider(err: &BifrostError) -> String {
    match err {
        BifrostError::Dispatch { provider, .. }
        | BifrostError::DispatchTimeout { provider, .. } => provider.clone(),
        _ => "none".to_string(),
    }
}

fn respond(start: Instant, payload: String, provider: String, status: CacheStatus) -> RouteResponse {
    let label = match status {
        CacheStatus::Hit => "cache",
        CacheStatus::Miss => provider.as_str(),
    };
    record_request(label, "ok", start);
    let latency_ms = start.elapsed().as_millis() as u64;
    RouteResponse {
        payload,
        provider_used: provider,
        cache_status: status,
        latency_ms,
    }
}

fn record_request(provider: &str, status: &'static str, start: Instant) {
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "provider" => provider.to_owned(), "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "provider" => provider.to_owned(), "status" => status,
    )
    .record(start.elapsed().as_secs_f64());
}

/// Map a follower's shared failure back to an error.
///
/// Followers see the same error shape the leader's own caller saw: a
/// routing failure surfaces as [`BifrostError::NoEligibleProvider`]
/// with the leader's rejection list, not as a synthetic dispatch error.
fn follower_error(failure: FlightFailure) -> BifrostError {
    if failure.abandoned {
        return BifrostError::LeaderAbandoned;
    }
    if !failure.rejections.is_empty() {
        return BifrostError::NoEligibleProvider {
            rejections: failure.rejections,
        };
    }
    if failure.attempts == 0 {
        // Leader terminated before any dispatch attempt, e.g. the
        // request deadline elapsed first.
        return BifrostError::Dispatch {
            provider: failure.provider,
            message: failure.message,
        };
    }
    BifrostError::Exhausted {
        attempts: failure.attempts,
        last: Box::new(BifrostError::Dispatch {
            provider: failure.provider,
            message: failure.message,
        }),
    }
}
