//! Limit-up polling loop
//!
//! Each tick samples the session clock, scans the quote table, resolves
//! snapshots for the shortlist concurrently, applies the settled batch to the
//! tracker and emits whatever alerts it decided on.
//!
//! Data flow:
//! QuoteSource → QuoteScanner → SnapshotFetcher → InstrumentStateTracker → AlertEmitter

use std::future::Future;
use std::time::Duration;

use common::logger::{TraceId, child_span, root_span, warn_if_slow};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, Span, debug, info, warn};

use crate::alert::AlertEmitter;
use crate::clock::{SessionClock, SessionPhase};
use crate::error::AppError;
use crate::fetcher::SnapshotFetcher;
use crate::metrics::counters::{CounterSnapshot, CycleCounters};
use crate::scanner::QuoteScanner;
use crate::tracker::InstrumentStateTracker;

/// Fetch phases slower than this are reported on the `performance` target.
const SLOW_FETCH: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub poll_every: Duration,

    /// Keep cycling outside the session window.
    pub bypass_session_clock: bool,
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub scan_failed: bool,
    pub shortlisted: usize,
    pub resolved: usize,
    pub alerts: usize,
}

pub struct Monitor {
    clock: SessionClock,
    scanner: QuoteScanner,
    fetcher: SnapshotFetcher,
    tracker: InstrumentStateTracker,
    emitter: AlertEmitter,
    counters: CycleCounters,
    settings: LoopSettings,
}

impl Monitor {
    pub fn new(
        clock: SessionClock,
        scanner: QuoteScanner,
        fetcher: SnapshotFetcher,
        tracker: InstrumentStateTracker,
        emitter: AlertEmitter,
        counters: CycleCounters,
        settings: LoopSettings,
    ) -> Self {
        Self {
            clock,
            scanner,
            fetcher,
            tracker,
            emitter,
            counters,
            settings,
        }
    }

    pub fn clock_mut(&mut self) -> &mut SessionClock {
        &mut self.clock
    }

    pub fn tracker(&self) -> &InstrumentStateTracker {
        &self.tracker
    }

    pub fn counters(&self) -> &CycleCounters {
        &self.counters
    }

    /// Runs one cycle at the clock's current `now`.
    ///
    /// A failed quote-table fetch abandons only this cycle; the next tick is
    /// the retry.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let now = self.clock.now();
        CycleCounters::bump(&self.counters.cycles);

        info!(at = %now.format("%m-%d %H:%M:%S"), "refresh");

        let shortlist = match self.scanner.scan().instrument(child_span("scan")).await {
            Ok(shortlist) => shortlist,
            Err(e) => {
                let e = AppError::from(e);
                CycleCounters::bump(&self.counters.scan_failures);
                warn!(error = %e, "cycle abandoned; retrying next tick");
                return CycleReport {
                    scan_failed: true,
                    ..CycleReport::default()
                };
            }
        };

        Span::current().record("shortlisted", shortlist.len() as u64);

        if shortlist.is_empty() {
            CycleCounters::bump(&self.counters.empty_cycles);
            debug!("no instrument above the gain threshold");
            return CycleReport::default();
        }

        let snapshots = warn_if_slow(
            "snapshot_fetch",
            SLOW_FETCH,
            self.fetcher
                .fetch(shortlist.identifiers())
                .instrument(child_span("fetch")),
        )
        .await;

        let misses = shortlist.len().saturating_sub(snapshots.len());
        CycleCounters::add(&self.counters.snapshot_misses, misses as u64);

        let alerts = self.tracker.apply_batch(&shortlist, &snapshots, now);

        for alert in &alerts {
            self.emitter.emit(alert).await;
        }

        CycleReport {
            scan_failed: false,
            shortlisted: shortlist.len(),
            resolved: snapshots.len(),
            alerts: alerts.len(),
        }
    }

    /// Polls until the session window closes or `shutdown` resolves.
    ///
    /// Before the window opens ticks are skipped. `shutdown` is only observed
    /// between cycles, so in-flight fetches always finish.
    pub async fn run<F>(mut self, shutdown: F) -> CounterSnapshot
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.settings.poll_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let (start, end) = self.clock.window();
        info!(
            %start,
            %end,
            every_ms = self.settings.poll_every.as_millis() as u64,
            bypass_session_clock = self.settings.bypass_session_clock,
            sinks = ?self.emitter.sink_names(),
            "limit-up monitor started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let in_session = self.clock.advance();
            if !in_session && !self.settings.bypass_session_clock {
                if self.clock.phase() == SessionPhase::PreOpen {
                    debug!("waiting for the session to open");
                    continue;
                }
                info!("session window closed");
                break;
            }

            let span = root_span("cycle", &TraceId::default());
            self.run_cycle().instrument(span).await;
        }

        let totals = self.counters.snapshot();
        info!(
            cycles = totals.cycles,
            empty_cycles = totals.empty_cycles,
            scan_failures = totals.scan_failures,
            snapshot_misses = totals.snapshot_misses,
            alerts = totals.alerts_emitted,
            alerts_undelivered = totals.alerts_undelivered,
            sink_failures = totals.sink_failures,
            "monitoring finished for today"
        );
        totals
    }
}
