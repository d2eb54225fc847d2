//! Provider health state machine.
//!
//! healthy → degraded after `soft_threshold` consecutive failures →
//! unavailable after `hard_threshold`. Any success resets the failure
//! counter; returning to healthy from degraded or unavailable requires
//! the cooldown to elapse first, then one probing success.
//!
//! Concurrency: the consecutive-failure counter is an atomic so outcome
//! reports never lose updates; the state transition itself is computed
//! under a lock scoped to one provider, so there is no cross-provider
//! contention.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use super::descriptor::HealthState;

/// Thresholds and cooldown for health transitions.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthPolicy {
    /// Consecutive failures before a provider is degraded. Default: 3.
    #[serde(default = "default_soft_threshold")]
    pub soft_threshold: u32,
    /// Consecutive failures before a provider is unavailable. Default: 6.
    #[serde(default = "default_hard_threshold")]
    pub hard_threshold: u32,
    /// Time a degraded/unavailable provider must wait before a probe
    /// success can restore it. Default: 30 s.
    #[serde(default = "default_cooldown", with = "cooldown_secs")]
    pub cooldown: Duration,
}

mod cooldown_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

fn default_soft_threshold() -> u32 {
    3
}
fn default_hard_threshold() -> u32 {
    6
}
fn default_cooldown() -> Duration {
    Duration::from_secs(30)
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            soft_threshold: default_soft_threshold(),
            hard_threshold: default_hard_threshold(),
            cooldown: default_cooldown(),
        }
    }
}

struct StateCell {
    state: HealthState,
    /// When the current non-healthy state was entered. Cooldown is
    /// measured from here.
    since: Instant,
}

/// Per-provider health tracker.
pub(crate) struct HealthTracker {
    consecutive_failures: AtomicU32,
    cell: Mutex<StateCell>,
}

impl HealthTracker {
    pub(crate) fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            cell: Mutex::new(StateCell {
                state: HealthState::Healthy,
                since: Instant::now(),
            }),
        }
    }

    /// Record a failed dispatch. Returns the new state if it changed.
    pub(crate) fn record_failure(&self, policy: &HealthPolicy) -> Option<HealthState> {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        let mut cell = lock(&self.cell);
        let next = if failures >= policy.hard_threshold {
            HealthState::Unavailable
        } else if failures >= policy.soft_threshold {
            HealthState::Degraded
        } else {
            return None;
        };
        if cell.state == next {
            return None;
        }
        cell.state = next;
        cell.since = Instant::now();
        Some(next)
    }

    /// Record a successful dispatch. Returns the new state if it changed.
    ///
    /// Success always resets the failure counter. It only restores
    /// healthy when the cooldown has elapsed; a success during the
    /// cooldown window leaves the state as is.
    pub(crate) fn record_success(&self, policy: &HealthPolicy) -> Option<HealthState> {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut cell = lock(&self.cell);
        if cell.state == HealthState::Healthy {
            return None;
        }
        if cell.since.elapsed() < policy.cooldown {
            return None;
        }
        cell.state = HealthState::Healthy;
        cell.since = Instant::now();
        Some(HealthState::Healthy)
    }

    /// Raw state as last transitioned.
    pub(crate) fn state(&self) -> HealthState {
        lock(&self.cell).state
    }

    /// State as the selector should see it: an unavailable provider past
    /// its cooldown is reported degraded, which re-admits it to selection
    /// (penalised) so a probe can reach it.
    pub(crate) fn effective_state(&self, policy: &HealthPolicy) -> HealthState {
        let cell = lock(&self.cell);
        match cell.state {
            HealthState::Unavailable if cell.since.elapsed() >= policy.cooldown => {
                HealthState::Degraded
            }
            state => state,
        }
    }
}

fn lock(cell: &Mutex<StateCell>) -> std::sync::MutexGuard<'_, StateCell> {
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
