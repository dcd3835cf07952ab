pub mod alert;
pub mod cli;
pub mod clock;
pub mod config;
pub mod fetcher;
pub mod metrics;
pub mod poller;
pub mod scanner;
pub mod tracker;
pub mod watchlist;

pub mod error;
