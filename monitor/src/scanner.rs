//! Per-cycle quote-table scan producing the shortlist of strong gainers.

use std::collections::BTreeMap;
use std::sync::Arc;

use market::{MarketError, PercentChange, QuoteRow, QuoteSource};
use tracing::{debug, instrument};

use crate::watchlist::WatchList;

/// Instruments that passed the scan, keyed by identifier.
///
/// The key set is the cycle's candidate set; the rows carry the display name
/// the tracker needs when it first sees an instrument.
#[derive(Debug, Clone, Default)]
pub struct Shortlist {
    rows: BTreeMap<String, QuoteRow>,
}

impl Shortlist {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.rows.contains_key(identifier)
    }

    pub fn get(&self, identifier: &str) -> Option<&QuoteRow> {
        self.rows.get(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.keys().map(String::as_str)
    }

    pub fn rows(&self) -> impl Iterator<Item = &QuoteRow> + '_ {
        self.rows.values()
    }
}

impl FromIterator<QuoteRow> for Shortlist {
    fn from_iter<I: IntoIterator<Item = QuoteRow>>(iter: I) -> Self {
        Self {
            rows: iter
                .into_iter()
                .map(|row| (row.identifier.clone(), row))
                .collect(),
        }
    }
}

pub struct QuoteScanner {
    source: Arc<dyn QuoteSource>,

    /// Rows must be up strictly more than this (percent).
    gain_threshold_pct: f64,

    /// When present, only watch-listed instruments are shortlisted.
    watchlist: Option<WatchList>,
}

impl QuoteScanner {
    pub fn new(source: Arc<dyn QuoteSource>, gain_threshold_pct: f64) -> Self {
        Self {
            source,
            gain_threshold_pct,
            watchlist: None,
        }
    }

    pub fn with_watchlist(mut self, watchlist: WatchList) -> Self {
        self.watchlist = Some(watchlist);
        self
    }

    /// Fetches the full quote table and keeps traded rows above the threshold.
    #[instrument(skip(self), level = "debug", fields(threshold = self.gain_threshold_pct))]
    pub async fn scan(&self) -> Result<Shortlist, MarketError> {
        let table = self.source.fetch_quote_table().await?;
        let total = table.len();

        let shortlist = self.filter(table);

        debug!(total, shortlisted = shortlist.len(), "quote table scanned");

        Ok(shortlist)
    }

    pub fn filter(&self, table: Vec<QuoteRow>) -> Shortlist {
        table
            .into_iter()
            .filter(|row| match row.percent_change {
                PercentChange::Traded(pct) => pct > self.gain_threshold_pct,
                PercentChange::NoTrade => false,
            })
            .filter(|row| {
                self.watchlist
                    .as_ref()
                    .is_none_or(|w| w.contains(&row.identifier, &row.display_name))
            })
            .collect()
    }
}
