//! Per-provider rolling latency estimation.
//!
//! Exponentially weighted moving average over dispatch durations,
//! lock-free via a CAS loop on the f64 bit pattern. The estimate feeds
//! the selector's soft ranking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default EWMA smoothing factor. Higher reacts faster but is noisier.
const DEFAULT_ALPHA: f64 = 0.2;

/// Rolling latency estimate for one provider.
pub struct LatencyTracker {
    /// EWMA of dispatch duration in microseconds (f64 bits).
    estimate_micros: AtomicU64,
    observations: AtomicU64,
    alpha: f64,
}

impl LatencyTracker {
    pub fn new(alpha: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&alpha), "alpha must be in [0.0, 1.0]");
        Self {
            estimate_micros: AtomicU64::new(0_f64.to_bits()),
            observations: AtomicU64::new(0),
            alpha,
        }
    }

    /// Record one dispatch duration.
    ///
    /// A race on the very first observation can initialise the estimate
    /// twice; the estimate converges after a few more observations and is
    /// only used for ranking, so this is harmless.
    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros() as f64;
        loop {
            let current_bits = self.estimate_micros.load(Ordering::Relaxed);
            let current = f64::from_bits(current_bits);
            let next = if self.observations.load(Ordering::Relaxed) == 0 {
                micros
            } else {
                self.alpha * micros + (1.0 - self.alpha) * current
            };
            if self
                .estimate_micros
                .compare_exchange_weak(
                    current_bits,
                    next.to_bits(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                self.observations.fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
    }

    /// Current estimate, or `None` before the first observation.
    pub fn estimate(&self) -> Option<Duration> {
        if self.observations.load(Ordering::Relaxed) == 0 {
            return None;
        }
        let micros = f64::from_bits(self.estimate_micros.load(Ordering::Relaxed));
        Some(Duration::from_micros(micros as u64))
    }

    pub fn observation_count(&self) -> u64 {
        self.observations.load(Ordering::Relaxed)
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl std::fmt::Debug for LatencyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyTracker")
            .field("estimate", &self.estimate())
            .field("observations", &self.observation_count())
            .finish()
    }
}
