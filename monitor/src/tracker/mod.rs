//! Limit-up state machine.
//!
//! One [`InstrumentState`] per identifier, owned exclusively by
//! [`InstrumentStateTracker`]. Each cycle the resolved snapshot batch is
//! applied single-threaded; every instrument is independent of the others.
//!
//! Per instrument the persisted states are UNSEEN (no record), OFF_CEILING and
//! AT_CEILING. While at the ceiling a cycle is further classified as a
//! [`CeilingTransition`], which only drives alerting:
//!
//! - `NewlyAtCeiling`: first sight, or the price rose into the ceiling.
//! - `CeilingSustained`: same price as last cycle.
//! - `CeilingBrokenWithinCycle`: lower than last cycle yet still within
//!   tolerance of the ceiling. Counted as a break: `last_non_ceiling_at`
//!   advances and no alert fires.

mod state;

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::NaiveDateTime;
use market::Snapshot;
use tracing::{debug, info};

pub use state::InstrumentState;

use crate::alert::AlertPayload;
use crate::scanner::Shortlist;

/// Absorbs representation error so that a one-tick retreat (ceiling − 0.01)
/// is never mistaken for "within 0.01 of the ceiling". Only applied to
/// tolerances wider than itself, so an exact match always counts.
pub const FLOAT_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CeilingTransition {
    NewlyAtCeiling,
    CeilingSustained,
    CeilingBrokenWithinCycle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Absolute price distance still counted as "at ceiling".
    pub ceiling_tolerance: f64,

    /// Sustained limit-ups alert while held for at most this many seconds.
    pub sustain_alert_secs: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ceiling_tolerance: 0.01,
            sustain_alert_secs: 60,
        }
    }
}

/// Result of applying one snapshot to one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// `None` when the instrument is off its ceiling this cycle.
    pub transition: Option<CeilingTransition>,
    pub alert: Option<AlertPayload>,
}

#[derive(Debug, Default)]
pub struct InstrumentStateTracker {
    config: TrackerConfig,
    states: HashMap<String, InstrumentState>,
}

impl InstrumentStateTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn get(&self, identifier: &str) -> Option<&InstrumentState> {
        self.states.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn is_at_ceiling(&self, ceiling_price: f64, price: f64) -> bool {
        let tolerance = self.config.ceiling_tolerance;
        let slack = if tolerance > FLOAT_SLACK { FLOAT_SLACK } else { 0.0 };
        (ceiling_price - price).abs() + slack < tolerance
    }

    /// Applies a resolved batch. Shortlisted identifiers without a snapshot are
    /// skipped for this cycle; no record is created for them.
    pub fn apply_batch(
        &mut self,
        shortlist: &Shortlist,
        snapshots: &HashMap<String, Snapshot>,
        now: NaiveDateTime,
    ) -> Vec<AlertPayload> {
        let mut alerts = Vec::new();

        for row in shortlist.rows() {
            let Some(snapshot) = snapshots.get(&row.identifier) else {
                debug!(identifier = %row.identifier, "no snapshot this cycle; skipped");
                continue;
            };

            if let Some(alert) = self
                .observe(&row.identifier, &row.display_name, snapshot, now)
                .alert
            {
                alerts.push(alert);
            }
        }

        alerts
    }

    /// Updates (or creates) the record for `identifier` and decides whether an alert fires.
    pub fn observe(
        &mut self,
        identifier: &str,
        display_name: &str,
        snapshot: &Snapshot,
        now: NaiveDateTime,
    ) -> Observation {
        let price = snapshot.current_price;
        let at_ceiling = self.is_at_ceiling(snapshot.ceiling_price, price);
        let config = self.config;

        let (state, first_sight) = match self.states.entry(identifier.to_string()) {
            Entry::Occupied(o) => (o.into_mut(), false),
            Entry::Vacant(v) => {
                debug!(identifier, "first sight");
                (
                    v.insert(InstrumentState::first_sight(
                        identifier.to_string(),
                        display_name.to_string(),
                        snapshot,
                        now,
                    )),
                    true,
                )
            }
        };

        state.ceiling_price = snapshot.ceiling_price;
        state.floor_price = snapshot.floor_price;

        let transition = if at_ceiling {
            if first_sight || price > state.last_price {
                state.mark_at_ceiling(now);
                Some(CeilingTransition::NewlyAtCeiling)
            } else if price == state.last_price {
                state.mark_at_ceiling(now);
                Some(CeilingTransition::CeilingSustained)
            } else {
                state.mark_off_ceiling(now);
                Some(CeilingTransition::CeilingBrokenWithinCycle)
            }
        } else {
            state.mark_off_ceiling(now);
            None
        };

        state.last_price = price;
        state.last_observed_at = now;

        let fire = match transition {
            Some(CeilingTransition::NewlyAtCeiling) => true,
            Some(CeilingTransition::CeilingSustained) => state
                .ceiling_hold_duration()
                .is_some_and(|d| d.num_seconds() <= config.sustain_alert_secs),
            Some(CeilingTransition::CeilingBrokenWithinCycle) | None => false,
        };

        if let Some(t) = transition {
            debug!(identifier, transition = ?t, price, hold_secs = state.ceiling_hold_secs(), fire, "ceiling classified");
        }
        if transition == Some(CeilingTransition::CeilingBrokenWithinCycle) {
            info!(identifier, price, "limit-up broken within cycle; alert suppressed");
        }

        let alert = match transition {
            Some(t) if fire => Some(AlertPayload::new(state, snapshot, t)),
            _ => None,
        };

        Observation { transition, alert }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};
    use market::BidLadder;

    use super::*;

    const CEILING: f64 = 11.0;

    fn t(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            + TimeDelta::seconds(secs)
    }

    fn snap(price: f64) -> Snapshot {
        Snapshot {
            current_price: price,
            ceiling_price: CEILING,
            floor_price: 9.0,
            bid_quantities: BidLadder([52_310, 1_200, 300, 40, 5]),
        }
    }

    fn run(tracker: &mut InstrumentStateTracker, prices: &[(i64, f64)]) -> Vec<Observation> {
        prices
            .iter()
            .map(|&(at, p)| tracker.observe("600000", "浦发银行", &snap(p), t(at)))
            .collect()
    }

    fn transitions(obs: &[Observation]) -> Vec<Option<CeilingTransition>> {
        obs.iter().map(|o| o.transition).collect()
    }

    #[test]
    fn first_sight_at_ceiling_is_newly_and_alerts() {
        let mut tracker = InstrumentStateTracker::default();

        let obs = tracker.observe("600000", "浦发银行", &snap(CEILING), t(0));

        assert_eq!(obs.transition, Some(CeilingTransition::NewlyAtCeiling));
        let alert = obs.alert.expect("newly at ceiling always alerts");
        assert_eq!(alert.hold_secs, 0);
        assert_eq!(alert.display_name, "浦发银行");

        let state = tracker.get("600000").unwrap();
        assert_eq!(state.last_non_ceiling_at, t(0));
        assert_eq!(state.last_ceiling_entry_at, Some(t(0)));
    }

    #[test]
    fn first_sight_off_ceiling_creates_record_without_alert() {
        let mut tracker = InstrumentStateTracker::default();

        let obs = tracker.observe("600000", "浦发银行", &snap(10.5), t(0));

        assert_eq!(obs.transition, None);
        assert!(obs.alert.is_none());
        let state = tracker.get("600000").unwrap();
        assert_eq!(state.last_ceiling_entry_at, None);
        assert_eq!(state.last_price, 10.5);
    }

    #[test]
    fn identical_ceiling_prints_sustain_after_the_first() {
        let mut tracker = InstrumentStateTracker::default();

        let obs = run(&mut tracker, &[(0, CEILING), (3, CEILING), (6, CEILING), (9, CEILING)]);

        assert_eq!(
            transitions(&obs),
            vec![
                Some(CeilingTransition::NewlyAtCeiling),
                Some(CeilingTransition::CeilingSustained),
                Some(CeilingTransition::CeilingSustained),
                Some(CeilingTransition::CeilingSustained),
            ]
        );
    }

    #[test]
    fn one_tick_drop_then_reentry_is_newly_again() {
        let mut tracker = InstrumentStateTracker::default();

        let obs = run(
            &mut tracker,
            &[(0, CEILING), (3, CEILING), (6, CEILING - 0.01), (9, CEILING)],
        );

        assert_eq!(
            transitions(&obs),
            vec![
                Some(CeilingTransition::NewlyAtCeiling),
                Some(CeilingTransition::CeilingSustained),
                None,
                Some(CeilingTransition::NewlyAtCeiling),
            ]
        );
        // Re-entry hold is measured from the off-ceiling cycle.
        assert_eq!(obs[3].alert.as_ref().unwrap().hold_secs, 3);
    }

    #[test]
    fn sustained_alerts_stop_after_the_window() {
        let mut tracker = InstrumentStateTracker::default();

        let obs = run(&mut tracker, &[(0, CEILING), (30, CEILING), (60, CEILING), (61, CEILING)]);

        let fired: Vec<bool> = obs.iter().map(|o| o.alert.is_some()).collect();
        assert_eq!(fired, vec![true, true, true, false]);
        assert_eq!(obs[2].alert.as_ref().unwrap().hold_secs, 60);
    }

    #[test]
    fn sustain_window_is_configurable() {
        let mut tracker = InstrumentStateTracker::new(TrackerConfig {
            sustain_alert_secs: 5,
            ..TrackerConfig::default()
        });

        let obs = run(&mut tracker, &[(0, CEILING), (5, CEILING), (6, CEILING)]);

        let fired: Vec<bool> = obs.iter().map(|o| o.alert.is_some()).collect();
        assert_eq!(fired, vec![true, true, false]);
    }

    #[test]
    fn sub_tick_dip_at_ceiling_counts_as_break() {
        let mut tracker = InstrumentStateTracker::default();

        let obs = run(&mut tracker, &[(0, CEILING), (3, CEILING - 0.005), (6, CEILING)]);

        assert_eq!(obs[1].transition, Some(CeilingTransition::CeilingBrokenWithinCycle));
        assert!(obs[1].alert.is_none());
        assert_eq!(tracker.get("600000").unwrap().last_non_ceiling_at, t(3));

        // Price rose back into the ceiling: a fresh entry.
        assert_eq!(obs[2].transition, Some(CeilingTransition::NewlyAtCeiling));
        assert_eq!(obs[2].alert.as_ref().unwrap().hold_secs, 3);
    }

    #[test]
    fn exact_ceiling_counts_under_any_positive_tolerance() {
        for tolerance in [1e-12, FLOAT_SLACK, 2e-9, 0.01] {
            let mut tracker = InstrumentStateTracker::new(TrackerConfig {
                ceiling_tolerance: tolerance,
                ..TrackerConfig::default()
            });

            let obs = tracker.observe("600000", "浦发银行", &snap(CEILING), t(0));

            assert_eq!(obs.transition, Some(CeilingTransition::NewlyAtCeiling), "{tolerance:e}");
            assert!(obs.alert.is_some(), "{tolerance:e}");
        }
    }

    #[test]
    fn tiny_tolerance_rejects_a_one_tick_gap() {
        let tracker = InstrumentStateTracker::new(TrackerConfig {
            ceiling_tolerance: FLOAT_SLACK,
            ..TrackerConfig::default()
        });

        assert!(tracker.is_at_ceiling(CEILING, CEILING));
        assert!(!tracker.is_at_ceiling(CEILING, CEILING - 0.01));
    }

    #[test]
    fn rising_into_ceiling_measures_hold_from_last_off_cycle() {
        let mut tracker = InstrumentStateTracker::default();

        let obs = run(&mut tracker, &[(0, 10.8), (4, 10.95), (7, CEILING), (10, CEILING)]);

        assert_eq!(obs[2].transition, Some(CeilingTransition::NewlyAtCeiling));
        assert_eq!(obs[2].alert.as_ref().unwrap().hold_secs, 3);
        assert_eq!(obs[3].alert.as_ref().unwrap().hold_secs, 6);
    }

    #[test]
    fn display_name_is_fixed_at_creation_and_limits_refresh() {
        let mut tracker = InstrumentStateTracker::default();
        tracker.observe("600000", "浦发银行", &snap(10.0), t(0));

        let mut next = snap(10.2);
        next.ceiling_price = 11.1;
        tracker.observe("600000", "SPDB renamed", &next, t(3));

        let state = tracker.get("600000").unwrap();
        assert_eq!(state.display_name, "浦发银行");
        assert_eq!(state.ceiling_price, 11.1);
        assert_eq!(state.last_observed_at, t(3));
    }

    #[test]
    fn batch_skips_identifiers_without_snapshot() {
        use market::{PercentChange, QuoteRow};

        let shortlist: Shortlist = ["600000", "000001"]
            .into_iter()
            .map(|id| QuoteRow {
                identifier: id.into(),
                display_name: format!("name-{id}"),
                percent_change: PercentChange::Traded(9.9),
            })
            .collect();
        let snapshots = HashMap::from([("600000".to_string(), snap(CEILING))]);

        let mut tracker = InstrumentStateTracker::default();
        let alerts = tracker.apply_batch(&shortlist, &snapshots, t(0));

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].identifier, "600000");
        assert!(tracker.get("000001").is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn empty_batch_does_no_work() {
        let mut tracker = InstrumentStateTracker::default();

        let alerts = tracker.apply_batch(&Shortlist::default(), &HashMap::new(), t(0));

        assert!(alerts.is_empty());
        assert!(tracker.is_empty());
    }
}
