//! Session-time gating for the polling loop.

use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime};

/// Where `now` falls relative to the monitoring window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    PreOpen,
    Open,
    Closed,
}

/// Source of the current local wall-clock time.
pub type TimeSource = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Wall-clock gate over a closed `[start, end]` time-of-day window.
///
/// Each call to [`advance`](Self::advance) samples the time source and records
/// it as the cycle's `now`; every timestamp written by the tracker during that
/// cycle is this value.
#[derive(Clone)]
pub struct SessionClock {
    start: NaiveTime,
    end: NaiveTime,
    now: NaiveDateTime,
    source: TimeSource,
}

impl fmt::Debug for SessionClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClock")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl SessionClock {
    /// Clock over the machine's local time.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self::with_source(start, end, Arc::new(|| Local::now().naive_local()))
    }

    /// Clock over an arbitrary time source (replay, tests). `now` starts at the
    /// first sample.
    pub fn with_source(start: NaiveTime, end: NaiveTime, source: TimeSource) -> Self {
        let now = source();
        Self {
            start,
            end,
            now,
            source,
        }
    }

    /// Samples the time source; true iff inside the window (both ends inclusive).
    pub fn advance(&mut self) -> bool {
        let at = (self.source)();
        self.advance_to(at)
    }

    /// Records an explicit instant instead of sampling the clock.
    pub fn advance_to(&mut self, at: NaiveDateTime) -> bool {
        self.now = at;
        self.phase() == SessionPhase::Open
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase_of(self.now.time())
    }

    pub fn phase_of(&self, t: NaiveTime) -> SessionPhase {
        if t < self.start {
            SessionPhase::PreOpen
        } else if t > self.end {
            SessionPhase::Closed
        } else {
            SessionPhase::Open
        }
    }

    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        (self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn clock() -> SessionClock {
        SessionClock::new(
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        )
    }

    #[test]
    fn boundaries_are_inclusive() {
        let mut c = clock();

        assert!(!c.advance_to(at(8, 59, 59)));
        assert!(c.advance_to(at(9, 15, 0)));
        assert!(c.advance_to(at(15, 0, 0)));
        assert!(!c.advance_to(at(15, 0, 1)));
    }

    #[test]
    fn advance_records_now() {
        let mut c = clock();
        c.advance_to(at(10, 0, 0));
        assert_eq!(c.now(), at(10, 0, 0));
    }

    #[test]
    fn advance_samples_the_injected_source() {
        use std::sync::atomic::{AtomicI64, Ordering};

        let offset = Arc::new(AtomicI64::new(0));
        let ticks = Arc::clone(&offset);
        let mut c = SessionClock::with_source(
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            Arc::new(move || at(9, 14, 59) + chrono::TimeDelta::seconds(ticks.load(Ordering::SeqCst))),
        );
        assert_eq!(c.phase(), SessionPhase::PreOpen);

        offset.store(1, Ordering::SeqCst);
        assert!(c.advance());
        assert_eq!(c.now(), at(9, 15, 0));
    }

    #[test]
    fn phase_distinguishes_before_and_after() {
        let mut c = clock();

        c.advance_to(at(9, 15, 0).checked_sub_signed(chrono::TimeDelta::seconds(1)).unwrap());
        assert_eq!(c.phase(), SessionPhase::PreOpen);

        c.advance_to(at(11, 30, 0));
        assert_eq!(c.phase(), SessionPhase::Open);

        c.advance_to(at(16, 0, 0));
        assert_eq!(c.phase(), SessionPhase::Closed);
    }
}
