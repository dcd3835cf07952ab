use chrono::{NaiveDateTime, TimeDelta};
use market::Snapshot;

/// Per-instrument record, created on first sight and kept for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentState {
    pub identifier: String,

    /// Taken from the quote row on first sight and never refreshed.
    pub display_name: String,

    pub last_observed_at: NaiveDateTime,
    pub last_price: f64,

    pub ceiling_price: f64,
    pub floor_price: f64,

    /// Latest cycle in which the instrument was at its ceiling.
    pub last_ceiling_entry_at: Option<NaiveDateTime>,

    /// Latest cycle in which the instrument was off its ceiling. Never moves backwards.
    pub last_non_ceiling_at: NaiveDateTime,
}

impl InstrumentState {
    /// First observation. The instrument is assumed to have been off the
    /// ceiling at `now`, even when it already trades there.
    pub fn first_sight(
        identifier: String,
        display_name: String,
        snapshot: &Snapshot,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            identifier,
            display_name,
            last_observed_at: now,
            last_price: snapshot.current_price,
            ceiling_price: snapshot.ceiling_price,
            floor_price: snapshot.floor_price,
            last_ceiling_entry_at: None,
            last_non_ceiling_at: now,
        }
    }

    /// `last_ceiling_entry_at - last_non_ceiling_at`; `None` until the
    /// instrument has been at its ceiling at least once. Only meaningful while
    /// it is at the ceiling.
    pub fn ceiling_hold_duration(&self) -> Option<TimeDelta> {
        self.last_ceiling_entry_at
            .map(|entry| entry - self.last_non_ceiling_at)
    }

    /// Whole seconds of [`ceiling_hold_duration`](Self::ceiling_hold_duration), floored at zero.
    pub fn ceiling_hold_secs(&self) -> i64 {
        self.ceiling_hold_duration()
            .map_or(0, |d| d.num_seconds().max(0))
    }

    pub(crate) fn mark_at_ceiling(&mut self, now: NaiveDateTime) {
        self.last_ceiling_entry_at = Some(now);
    }

    pub(crate) fn mark_off_ceiling(&mut self, now: NaiveDateTime) {
        self.last_non_ceiling_at = self.last_non_ceiling_at.max(now);
    }
}
