//! Market data for the limit-up monitor.
//!
//! Typed quote/snapshot records, the provider traits the monitor consumes,
//! and the Eastmoney HTTP implementation of both.

pub mod eastmoney;
pub mod errors;
pub mod provider;
pub mod types;

pub use errors::MarketError;
pub use provider::{QuoteSource, SnapshotSource};
pub use types::{BidLadder, PercentChange, QuoteRow, Snapshot};
