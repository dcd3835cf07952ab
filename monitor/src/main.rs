use std::sync::Arc;

use clap::Parser;
use common::logger::init_tracing;
use market::eastmoney::EastmoneyClient;
use monitor::{
    alert::{AlertEmitter, ConsoleAlertSink, LogAlertSink, WebhookAlertSink},
    cli::Cli,
    clock::SessionClock,
    config::AppConfig,
    fetcher::SnapshotFetcher,
    metrics::counters::CycleCounters,
    poller::{LoopSettings, Monitor},
    scanner::QuoteScanner,
    tracker::{InstrumentStateTracker, TrackerConfig},
    watchlist::WatchList,
};
use tracing::{error, info};

/// Builds the alert emitter with console + log sinks, and the webhook when configured.
fn build_emitter(cfg: &AppConfig, counters: CycleCounters) -> anyhow::Result<AlertEmitter> {
    let mut emitter = AlertEmitter::new(cfg.alert_locale, counters)
        .with_sink(Arc::new(ConsoleAlertSink))
        .with_sink(Arc::new(LogAlertSink));

    if let Some(url) = &cfg.alert_webhook_url {
        emitter = emitter.with_sink(Arc::new(WebhookAlertSink::new(
            url.clone(),
            cfg.fetch_timeout,
        )?));
    }

    Ok(emitter)
}

/// Wires the provider, scanner, fetcher, tracker and emitter into one monitor.
fn build_monitor(cfg: &AppConfig) -> anyhow::Result<Monitor> {
    let client = Arc::new(EastmoneyClient::new(
        cfg.quote_list_url.clone(),
        cfg.snapshot_url.clone(),
        cfg.fetch_timeout,
    )?);

    let mut scanner = QuoteScanner::new(client.clone(), cfg.gain_threshold_pct);
    if let Some(path) = &cfg.watchlist_path {
        let watchlist = WatchList::load(path)?;
        if cfg.watchlist_filter {
            scanner = scanner.with_watchlist(watchlist);
        }
    }

    let fetcher = SnapshotFetcher::new(client, cfg.fetch_timeout, cfg.max_concurrent_fetches);

    let tracker = InstrumentStateTracker::new(TrackerConfig {
        ceiling_tolerance: cfg.ceiling_tolerance,
        sustain_alert_secs: cfg.sustain_alert_secs,
    });

    let counters = CycleCounters::default();
    let emitter = build_emitter(cfg, counters.clone())?;

    Ok(Monitor::new(
        SessionClock::new(cfg.session_start, cfg.session_end),
        scanner,
        fetcher,
        tracker,
        emitter,
        counters,
        LoopSettings {
            poll_every: cfg.poll_interval,
            bypass_session_clock: cfg.bypass_session_clock,
        },
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    let cli = Cli::parse();
    let cfg = cli.apply(AppConfig::from_env()?)?;

    info!(
        threshold_pct = cfg.gain_threshold_pct,
        tolerance = cfg.ceiling_tolerance,
        sustain_secs = cfg.sustain_alert_secs,
        "Starting limit-up monitor..."
    );

    let monitor = build_monitor(&cfg)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "ctrl-c handler unavailable; running until session end");
            std::future::pending::<()>().await;
        }
    };

    let totals = monitor.run(shutdown).await;
    info!(alerts = totals.alerts_emitted, "monitoring finished");

    Ok(())
}
