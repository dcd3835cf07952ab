use async_trait::async_trait;

use crate::errors::MarketError;
use crate::types::{QuoteRow, Snapshot};

/// Full real-time quote table of every tradable instrument.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote_table(&self) -> Result<Vec<QuoteRow>, MarketError>;
}

/// Detailed snapshot for a single instrument, one request per identifier.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, identifier: &str) -> Result<Snapshot, MarketError>;
}
