//! Leader metrics and timing measurements
//!
//! Timings are keyed by operation name and recorded through a guard that
//! measures on drop, so early returns are measured as well.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Timing key for the consistency barrier
pub const BARRIER: &str = "barrier";
/// Timing key for a full reconciliation pass
pub const RECONCILE: &str = "reconcile";
/// Timing key for a single member reconciliation
pub const RECONCILE_MEMBER: &str = "reconcileMember";

/// Aggregated timings for one operation
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    /// Number of samples
    pub count: u64,
    /// Sum of all samples
    pub total: Duration,
    /// Fastest sample
    pub min: Duration,
    /// Slowest sample
    pub max: Duration,
    /// Most recent sample
    pub last: Duration,
}

impl TimingStats {
    fn record(&mut self, elapsed: Duration) {
        if self.count == 0 || elapsed < self.min {
            self.min = elapsed;
        }
        if elapsed > self.max {
            self.max = elapsed;
        }
        self.count += 1;
        self.total += elapsed;
        self.last = elapsed;
    }

    /// Mean sample, zero when nothing was recorded
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos((self.total.as_nanos() / u128::from(self.count)) as u64)
        }
    }
}

/// Point-in-time copy of all leader metrics
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timings: BTreeMap<String, TimingStats>,
    pub terms_started: u64,
    pub peers_added: u64,
    pub peers_removed: u64,
    pub bootstrap_conflicts: u64,
    pub barrier_failures: u64,
    pub reconcile_failures: u64,
    pub active_loops: usize,
    pub max_active_loops: usize,
}

/// Metrics shared by every leadership component of a server
#[derive(Debug, Default)]
pub struct LeaderMetrics {
    timings: Mutex<BTreeMap<&'static str, TimingStats>>,
    terms_started: AtomicU64,
    peers_added: AtomicU64,
    peers_removed: AtomicU64,
    bootstrap_conflicts: AtomicU64,
    barrier_failures: AtomicU64,
    reconcile_failures: AtomicU64,
    active_loops: AtomicUsize,
    max_active_loops: AtomicUsize,
}

impl LeaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a measurement that is recorded under `key` when dropped
    pub fn measure(&self, key: &'static str) -> Measurement<'_> {
        Measurement {
            metrics: self,
            key,
            start: Instant::now(),
        }
    }

    /// Record the time elapsed since `start` under `key`
    pub fn measure_since(&self, key: &'static str, start: Instant) {
        let elapsed = start.elapsed();
        tracing::trace!(key, elapsed_us = elapsed.as_micros() as u64, "timing");
        self.timings.lock().entry(key).or_default().record(elapsed);
    }

    /// Timings recorded so far for `key`
    pub fn timing(&self, key: &str) -> Option<TimingStats> {
        self.timings.lock().get(key).cloned()
    }

    pub fn incr_terms_started(&self) {
        self.terms_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_peers_added(&self) {
        self.peers_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_peers_removed(&self) {
        self.peers_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_bootstrap_conflicts(&self) {
        self.bootstrap_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_barrier_failures(&self) {
        self.barrier_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_reconcile_failures(&self) {
        self.reconcile_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a leader loop as running. The returned guard marks it stopped.
    pub fn loop_started(&self) -> ActiveLoop<'_> {
        let active = self.active_loops.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_loops.fetch_max(active, Ordering::SeqCst);
        ActiveLoop { metrics: self }
    }

    /// Number of leader loops currently running
    pub fn active_loops(&self) -> usize {
        self.active_loops.load(Ordering::SeqCst)
    }

    /// Highest number of leader loops ever running at once
    pub fn max_active_loops(&self) -> usize {
        self.max_active_loops.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let timings = self
            .timings
            .lock()
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        MetricsSnapshot {
            timings,
            terms_started: self.terms_started.load(Ordering::Relaxed),
            peers_added: self.peers_added.load(Ordering::Relaxed),
            peers_removed: self.peers_removed.load(Ordering::Relaxed),
            bootstrap_conflicts: self.bootstrap_conflicts.load(Ordering::Relaxed),
            barrier_failures: self.barrier_failures.load(Ordering::Relaxed),
            reconcile_failures: self.reconcile_failures.load(Ordering::Relaxed),
            active_loops: self.active_loops(),
            max_active_loops: self.max_active_loops(),
        }
    }
}

/// Records a timing when dropped
#[must_use = "the timing is recorded when the measurement is dropped"]
pub struct Measurement<'a> {
    metrics: &'a LeaderMetrics,
    key: &'static str,
    start: Instant,
}

impl Drop for Measurement<'_> {
    fn drop(&mut self) {
        self.metrics.measure_since(self.key, self.start);
    }
}

/// Decrements the active loop gauge when dropped
pub struct ActiveLoop<'a> {
    metrics: &'a LeaderMetrics,
}

impl Drop for ActiveLoop<'_> {
    fn drop(&mut self) {
        self.metrics.active_loops.fetch_sub(1, Ordering::SeqCst);
    }
}
