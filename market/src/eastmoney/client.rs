use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::eastmoney::wire::{parse_quote_table, parse_snapshot};
use crate::errors::MarketError;
use crate::provider::{QuoteSource, SnapshotSource};
use crate::types::{QuoteRow, Snapshot};

/// Shanghai + Shenzhen A-share boards (main, ChiNext, STAR).
const A_SHARE_FILTER: &str = "m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23,m:0 t:81 s:2048";

/// f12 = code, f14 = name, f3 = percent change.
const QUOTE_FIELDS: &str = "f12,f14,f3";

const JSONP_CALLBACK: &str = "jQuery_snapshot";

#[derive(Clone)]
pub struct EastmoneyClient {
    http: Client,
    quote_list_url: String,
    snapshot_url: String,
}

impl EastmoneyClient {
    pub fn new(
        quote_list_url: String,
        snapshot_url: String,
        timeout: Duration,
    ) -> Result<Self, MarketError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            quote_list_url,
            snapshot_url,
        })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_quote_table(&self) -> Result<Vec<QuoteRow>, MarketError> {
        let body = self
            .http
            .get(&self.quote_list_url)
            .query(&[
                ("pn", "1"),
                ("pz", "1000000"),
                ("po", "1"),
                ("np", "1"),
                ("fltt", "2"),
                ("invt", "2"),
                ("fid", "f3"),
                ("fs", A_SHARE_FILTER),
                ("fields", QUOTE_FIELDS),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let rows = parse_quote_table(&body)?;

        debug!(rows = rows.len(), "quote table fetched");

        Ok(rows)
    }

    #[instrument(skip(self), fields(identifier = %identifier), level = "debug")]
    pub async fn fetch_snapshot(&self, identifier: &str) -> Result<Snapshot, MarketError> {
        let body = self
            .http
            .get(&self.snapshot_url)
            .query(&[("id", identifier), ("callback", JSONP_CALLBACK)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let snapshot = parse_snapshot(&body)?;

        debug!(
            price = snapshot.current_price,
            ceiling = snapshot.ceiling_price,
            "snapshot fetched"
        );

        Ok(snapshot)
    }
}

#[async_trait]
impl QuoteSource for EastmoneyClient {
    async fn fetch_quote_table(&self) -> Result<Vec<QuoteRow>, MarketError> {
        EastmoneyClient::fetch_quote_table(self).await
    }
}

#[async_trait]
impl SnapshotSource for EastmoneyClient {
    async fn fetch_snapshot(&self, identifier: &str) -> Result<Snapshot, MarketError> {
        EastmoneyClient::fetch_snapshot(self, identifier).await
    }
}
