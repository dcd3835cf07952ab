//! Alert rendering and best-effort delivery.
//!
//! The tracker decides *whether* to alert; this module decides *how*. Every
//! sink is tried for every alert and a failing sink is logged and counted,
//! never propagated to the polling loop.

use std::fmt::Write as _;
use std::io::Write as _;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use market::{BidLadder, Snapshot};
use tracing::{info, warn};

use crate::metrics::counters::CycleCounters;
use crate::tracker::{CeilingTransition, InstrumentState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlertLocale {
    #[default]
    En,
    Zh,
}

impl FromStr for AlertLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "zh" | "cn" => Ok(Self::Zh),
            other => Err(format!("unknown locale {other:?} (expected en or zh)")),
        }
    }
}

impl CeilingTransition {
    pub fn label(&self, locale: AlertLocale) -> &'static str {
        match (locale, self) {
            (AlertLocale::En, Self::NewlyAtCeiling) => "just hit limit-up",
            (AlertLocale::En, Self::CeilingSustained) => "holding limit-up",
            (AlertLocale::En, Self::CeilingBrokenWithinCycle) => "limit-up broken",
            (AlertLocale::Zh, Self::NewlyAtCeiling) => "刚涨停",
            (AlertLocale::Zh, Self::CeilingSustained) => "保持涨停",
            (AlertLocale::Zh, Self::CeilingBrokenWithinCycle) => "涨停炸板",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertPayload {
    pub identifier: String,
    pub display_name: String,
    pub bid_quantities: BidLadder,
    pub transition: CeilingTransition,
    pub hold_secs: i64,
    pub price: f64,
    pub ceiling_price: f64,
    pub observed_at: NaiveDateTime,
}

impl AlertPayload {
    pub fn new(state: &InstrumentState, snapshot: &Snapshot, transition: CeilingTransition) -> Self {
        Self {
            identifier: state.identifier.clone(),
            display_name: state.display_name.clone(),
            bid_quantities: snapshot.bid_quantities,
            transition,
            hold_secs: state.ceiling_hold_secs(),
            price: snapshot.current_price,
            ceiling_price: snapshot.ceiling_price,
            observed_at: state.last_observed_at,
        }
    }

    pub fn render(&self, locale: AlertLocale) -> String {
        let mut out = String::new();
        let label = self.transition.label(locale);

        // Writing into a String cannot fail.
        let _ = match locale {
            AlertLocale::En => writeln!(
                out,
                "code: {}\nname: {}\n🚀 bid book 🚀\n{}\n🚀 {} 🚀\n🚀 limit-up held for {}s (price {:.2}, ceiling {:.2}) 🚀",
                self.identifier,
                self.display_name,
                self.bid_quantities,
                label,
                self.hold_secs,
                self.price,
                self.ceiling_price,
            ),
            AlertLocale::Zh => {
                let ladder = self
                    .bid_quantities
                    .iter()
                    .map(|(level, qty)| format!("买 {level}: {qty}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                writeln!(
                    out,
                    "股票代码: {}\n股票名称: {}\n🚀 封单情况 🚀\n{}\n🚀 {} 🚀\n🚀 涨停保持秒数: {} 🚀",
                    self.identifier, self.display_name, ladder, label, self.hold_secs,
                )
            }
        };

        out
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, payload: &AlertPayload, message: &str) -> anyhow::Result<()>;
}

/// Prints the rendered message to stdout.
pub struct ConsoleAlertSink;

#[async_trait]
impl AlertSink for ConsoleAlertSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn deliver(&self, _payload: &AlertPayload, message: &str) -> anyhow::Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{message}").context("write alert to stdout")?;
        stdout.flush().context("flush stdout")?;
        Ok(())
    }
}

/// Emits the alert as a structured `tracing` event.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, payload: &AlertPayload, _message: &str) -> anyhow::Result<()> {
        info!(
            identifier = %payload.identifier,
            name = %payload.display_name,
            transition = ?payload.transition,
            hold_secs = payload.hold_secs,
            price = payload.price,
            bid1 = payload.bid_quantities.level(1).unwrap_or(0),
            "limit-up alert"
        );
        Ok(())
    }
}

/// POSTs `{"text": message}` to a chat/notification webhook.
pub struct WebhookAlertSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build webhook client")?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, _payload: &AlertPayload, message: &str) -> anyhow::Result<()> {
        self.http
            .post(&self.url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await
            .context("post alert webhook")?
            .error_for_status()
            .context("alert webhook rejected")?;
        Ok(())
    }
}

pub struct AlertEmitter {
    sinks: Vec<Arc<dyn AlertSink>>,
    locale: AlertLocale,
    counters: CycleCounters,
}

impl AlertEmitter {
    pub fn new(locale: AlertLocale, counters: CycleCounters) -> Self {
        Self {
            sinks: Vec::new(),
            locale,
            counters,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Renders once and hands the message to every sink. Never fails; the
    /// alert counts as emitted when at least one sink accepted it.
    pub async fn emit(&self, payload: &AlertPayload) {
        let message = payload.render(self.locale);
        let mut delivered = 0usize;

        for sink in &self.sinks {
            if let Err(e) = sink.deliver(payload, &message).await {
                CycleCounters::bump(&self.counters.sink_failures);
                warn!(
                    sink = sink.name(),
                    identifier = %payload.identifier,
                    error = ?e,
                    "alert delivery failed; continuing"
                );
            } else {
                delivered += 1;
            }
        }

        if delivered > 0 {
            CycleCounters::bump(&self.counters.alerts_emitted);
        } else {
            CycleCounters::bump(&self.counters.alerts_undelivered);
            warn!(identifier = %payload.identifier, "alert reached no sink");
        }
    }
}
