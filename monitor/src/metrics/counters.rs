use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default, Debug)]
pub struct CycleCounters {
    pub cycles: Arc<AtomicU64>,

    // cycle outcomes
    pub empty_cycles: Arc<AtomicU64>,
    pub scan_failures: Arc<AtomicU64>,

    /// Shortlisted identifiers whose snapshot did not resolve.
    pub snapshot_misses: Arc<AtomicU64>,

    /// Alerts accepted by at least one sink.
    pub alerts_emitted: Arc<AtomicU64>,

    /// Alerts no sink accepted.
    pub alerts_undelivered: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
}

impl CycleCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            empty_cycles: self.empty_cycles.load(Ordering::Relaxed),
            scan_failures: self.scan_failures.load(Ordering::Relaxed),
            snapshot_misses: self.snapshot_misses.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
            alerts_undelivered: self.alerts_undelivered.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CycleCounters`], for logging and assertions.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub cycles: u64,
    pub empty_cycles: u64,
    pub scan_failures: u64,
    pub snapshot_misses: u64,
    pub alerts_emitted: u64,
    pub alerts_undelivered: u64,
    pub sink_failures: u64,
}
