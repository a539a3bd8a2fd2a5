//! Running totals for a validator runner.
//!
//! Counters are updated after every validator call, success or failure.
//! Atomics keep the accumulation safe when validators run concurrently.
//! Call [`RunnerStats::flush`] to emit the current values as one
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Cost is accumulated in nano-USD so it fits an integer atomic.
const NANOS_PER_USD: f64 = 1_000_000_000.0;

/// Lock-free counters owned by one runner.
#[derive(Debug, Default)]
pub struct RunnerStats {
    invocations: AtomicU64,
    failures: AtomicU64,
    cost_nano_usd: AtomicU64,
    duration_ms: AtomicU64,
}

/// Point-in-time copy of [`RunnerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerStatsSnapshot {
    pub invocations: u64,
    /// Calls that degraded into a synthetic error result.
    pub failures: u64,
    pub total_cost_usd: f64,
    pub total_duration_ms: u64,
}

impl RunnerStatsSnapshot {
    pub fn average_cost_usd(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.total_cost_usd / self.invocations as f64
        }
    }

    pub fn average_duration_ms(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.invocations as f64
        }
    }
}

impl RunnerStats {
    pub const fn new() -> Self {
        Self {
            invocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            cost_nano_usd: AtomicU64::new(0),
            duration_ms: AtomicU64::new(0),
        }
    }

    /// Record one finished validator call.
    pub fn record(&self, cost_usd: f64, duration_ms: u64, failed: bool) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let nanos = (cost_usd.max(0.0) * NANOS_PER_USD).round() as u64;
        self.cost_nano_usd.fetch_add(nanos, Ordering::Relaxed);
        self.duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        tracing::trace!(metric = "validator_invocations", "counter incremented");
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.cost_nano_usd.load(Ordering::Relaxed) as f64 / NANOS_PER_USD
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.duration_ms.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RunnerStatsSnapshot {
        RunnerStatsSnapshot {
            invocations: self.invocations(),
            failures: self.failures(),
            total_cost_usd: self.total_cost_usd(),
            total_duration_ms: self.total_duration_ms(),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let snap = self.snapshot();
        tracing::info!(
            metric = "flush",
            invocations = snap.invocations,
            failures = snap.failures,
            total_cost_usd = snap.total_cost_usd,
            total_duration_ms = snap.total_duration_ms,
        );
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.invocations.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.cost_nano_usd.store(0, Ordering::Relaxed);
        self.duration_ms.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_accumulate() {
        let stats = RunnerStats::new();
        stats.record(0.002, 120, false);
        stats.record(0.001, 80, true);

        let snap = stats.snapshot();
        assert_eq!(snap.invocations, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.total_duration_ms, 200);
        assert!((snap.total_cost_usd - 0.003).abs() < 1e-9);
        assert!((snap.average_cost_usd() - 0.0015).abs() < 1e-9);
        assert_eq!(snap.average_duration_ms(), 100.0);
    }

    #[test]
    fn empty_snapshot_averages_are_zero() {
        let snap = RunnerStats::new().snapshot();
        assert_eq!(snap.average_cost_usd(), 0.0);
        assert_eq!(snap.average_duration_ms(), 0.0);
    }

    #[test]
    fn reset_zeroes_all() {
        let stats = RunnerStats::new();
        stats.record(1.0, 10, true);
        stats.reset();
        assert_eq!(stats.snapshot(), RunnerStatsSnapshot::default());
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let stats = Arc::new(RunnerStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record(0.0001, 1, false);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.invocations(), 800);
        assert_eq!(stats.total_duration_ms(), 800);
        assert!((stats.total_cost_usd() - 0.08).abs() < 1e-6);
    }
}
