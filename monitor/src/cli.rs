use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::alert::AlertLocale;
use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LocaleCli {
    En,
    Zh,
}

impl From<LocaleCli> for AlertLocale {
    fn from(l: LocaleCli) -> Self {
        match l {
            LocaleCli::En => AlertLocale::En,
            LocaleCli::Zh => AlertLocale::Zh,
        }
    }
}

/// Command-line overrides. Anything not given here comes from the environment.
#[derive(Debug, Parser)]
#[clap(name = "monitor", version, about = "Limit-up monitor for SH/SZ equities")]
pub struct Cli {
    /// Keep polling outside the session window
    #[clap(long)]
    pub bypass_session_clock: bool,

    /// Watch-list file, one instrument code or name per line
    #[clap(long)]
    pub watchlist: Option<PathBuf>,

    /// Only alert on instruments named in the watch-list
    #[clap(long)]
    pub watchlist_filter: bool,

    /// Minimum percent gain for an instrument to be shortlisted
    #[clap(long)]
    pub gain_threshold: Option<f64>,

    /// Cycle cadence in milliseconds
    #[clap(long)]
    pub poll_interval_ms: Option<u64>,

    /// Alert language
    #[clap(long, value_enum)]
    pub locale: Option<LocaleCli>,
}

impl Cli {
    /// Layers the flags over `cfg` and re-validates the result.
    pub fn apply(&self, mut cfg: AppConfig) -> Result<AppConfig, AppError> {
        if self.bypass_session_clock {
            cfg.bypass_session_clock = true;
        }
        if let Some(path) = &self.watchlist {
            cfg.watchlist_path = Some(path.clone());
        }
        if self.watchlist_filter {
            cfg.watchlist_filter = true;
        }
        if let Some(pct) = self.gain_threshold {
            cfg.gain_threshold_pct = pct;
        }
        if let Some(ms) = self.poll_interval_ms {
            cfg.poll_interval = std::time::Duration::from_millis(ms);
        }
        if let Some(locale) = self.locale {
            cfg.alert_locale = locale.into();
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn flags_override_environment_config() {
        let cli = Cli::try_parse_from([
            "monitor",
            "--bypass-session-clock",
            "--gain-threshold",
            "9.5",
            "--poll-interval-ms",
            "1500",
            "--locale",
            "zh",
        ])
        .unwrap();

        let cfg = cli.apply(AppConfig::default()).unwrap();

        assert!(cfg.bypass_session_clock);
        assert_eq!(cfg.gain_threshold_pct, 9.5);
        assert_eq!(cfg.poll_interval, Duration::from_millis(1500));
        assert_eq!(cfg.alert_locale, AlertLocale::Zh);
    }

    #[test]
    fn no_flags_keep_config_as_is() {
        let cli = Cli::try_parse_from(["monitor"]).unwrap();
        let cfg = cli.apply(AppConfig::default()).unwrap();

        assert!(!cfg.bypass_session_clock);
        assert_eq!(cfg.gain_threshold_pct, 7.0);
        assert!(cfg.watchlist_path.is_none());
    }

    #[test]
    fn filter_without_watchlist_is_rejected() {
        let cli = Cli::try_parse_from(["monitor", "--watchlist-filter"]).unwrap();

        assert!(matches!(
            cli.apply(AppConfig::default()),
            Err(AppError::Config { .. })
        ));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cli = Cli::try_parse_from(["monitor", "--poll-interval-ms", "0"]).unwrap();

        assert!(cli.apply(AppConfig::default()).is_err());
    }
}
