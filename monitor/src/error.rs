use std::path::PathBuf;

use market::MarketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid configuration {key}: {reason}")]
    Config { key: &'static str, reason: String },

    #[error("watch-list unavailable at {}: {source}", path.display())]
    WatchList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("quote table fetch failed: {0}")]
    QuoteTable(#[from] MarketError),
}

impl AppError {
    pub fn config(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            key,
            reason: reason.into(),
        }
    }
}
