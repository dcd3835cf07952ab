use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;

use crate::alert::AlertLocale;
use crate::error::AppError;
use crate::tracker::FLOAT_SLACK;

#[derive(Clone, Debug)]
pub struct AppConfig {
    // =========================
    // Provider endpoints
    // =========================
    /// Full quote-table endpoint (one request per cycle).
    pub quote_list_url: String,

    /// Per-instrument snapshot endpoint (one request per shortlisted identifier).
    pub snapshot_url: String,

    /// Timeout applied to every provider request.
    ///
    /// A slow identifier must not stall the cycle, so the fetch barrier waits
    /// at most this long for any single snapshot.
    pub fetch_timeout: Duration,

    /// Upper bound on snapshot requests in flight at once.
    pub max_concurrent_fetches: usize,

    // =========================
    // Session gating
    // =========================
    /// Start of the monitoring window (local time, inclusive).
    pub session_start: NaiveTime,

    /// End of the monitoring window (local time, inclusive).
    pub session_end: NaiveTime,

    /// Keep polling outside the window. For exercising the loop out of hours.
    pub bypass_session_clock: bool,

    /// Cycle cadence. Missed ticks are skipped, not queued.
    pub poll_interval: Duration,

    // =========================
    // Detection
    // =========================
    /// Only instruments up by more than this many percent are shortlisted.
    pub gain_threshold_pct: f64,

    /// Absolute distance to the ceiling price still counted as "at ceiling".
    pub ceiling_tolerance: f64,

    /// A sustained limit-up keeps alerting while it has held for at most this
    /// many seconds.
    pub sustain_alert_secs: i64,

    // =========================
    // Watch-list & alerting
    // =========================
    pub watchlist_path: Option<PathBuf>,

    /// Restrict the shortlist to instruments named in the watch-list.
    pub watchlist_filter: bool,

    pub alert_locale: AlertLocale,

    /// When set, alerts are also POSTed here as `{"text": ...}`.
    pub alert_webhook_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            quote_list_url: "https://push2.eastmoney.com/api/qt/clist/get".to_string(),
            snapshot_url: "https://hsmarket.eastmoney.com/api/SHSZQuoteSnapshot".to_string(),
            fetch_timeout: Duration::from_millis(5_000),
            max_concurrent_fetches: 32,

            session_start: hms(9, 15, 0),
            session_end: hms(15, 0, 0),
            bypass_session_clock: false,
            poll_interval: Duration::from_millis(3_000),

            gain_threshold_pct: 7.0,
            ceiling_tolerance: 0.01,
            sustain_alert_secs: 60,

            watchlist_path: None,
            watchlist_filter: false,
            alert_locale: AlertLocale::En,
            alert_webhook_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cfg = Self {
            quote_list_url: get("EASTMONEY_QUOTE_URL").unwrap_or(defaults.quote_list_url),
            snapshot_url: get("EASTMONEY_SNAPSHOT_URL").unwrap_or(defaults.snapshot_url),
            fetch_timeout: match get("FETCH_TIMEOUT_MS") {
                Some(v) => Duration::from_millis(parse("FETCH_TIMEOUT_MS", &v)?),
                None => defaults.fetch_timeout,
            },
            max_concurrent_fetches: parse_or(
                "MAX_CONCURRENT_FETCHES",
                get("MAX_CONCURRENT_FETCHES"),
                defaults.max_concurrent_fetches,
            )?,

            session_start: match get("SESSION_START") {
                Some(v) => parse_time("SESSION_START", &v)?,
                None => defaults.session_start,
            },
            session_end: match get("SESSION_END") {
                Some(v) => parse_time("SESSION_END", &v)?,
                None => defaults.session_end,
            },
            bypass_session_clock: match get("BYPASS_SESSION_CLOCK") {
                Some(v) => parse_bool("BYPASS_SESSION_CLOCK", &v)?,
                None => defaults.bypass_session_clock,
            },
            poll_interval: match get("POLL_INTERVAL_MS") {
                Some(v) => Duration::from_millis(parse("POLL_INTERVAL_MS", &v)?),
                None => defaults.poll_interval,
            },

            gain_threshold_pct: parse_or(
                "GAIN_THRESHOLD_PCT",
                get("GAIN_THRESHOLD_PCT"),
                defaults.gain_threshold_pct,
            )?,
            ceiling_tolerance: parse_or(
                "CEILING_TOLERANCE",
                get("CEILING_TOLERANCE"),
                defaults.ceiling_tolerance,
            )?,
            sustain_alert_secs: parse_or(
                "SUSTAIN_ALERT_SECS",
                get("SUSTAIN_ALERT_SECS"),
                defaults.sustain_alert_secs,
            )?,

            watchlist_path: get("WATCHLIST_PATH").map(PathBuf::from),
            watchlist_filter: match get("WATCHLIST_FILTER") {
                Some(v) => parse_bool("WATCHLIST_FILTER", &v)?,
                None => defaults.watchlist_filter,
            },
            alert_locale: parse_or("ALERT_LOCALE", get("ALERT_LOCALE"), defaults.alert_locale)?,
            alert_webhook_url: get("ALERT_WEBHOOK_URL"),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.session_start > self.session_end {
            return Err(AppError::config(
                "SESSION_START",
                format!(
                    "{} is after SESSION_END {}",
                    self.session_start, self.session_end
                ),
            ));
        }
        if !self.gain_threshold_pct.is_finite() {
            return Err(AppError::config("GAIN_THRESHOLD_PCT", "must be finite"));
        }
        if !(self.ceiling_tolerance.is_finite() && self.ceiling_tolerance > FLOAT_SLACK) {
            return Err(AppError::config(
                "CEILING_TOLERANCE",
                format!("must be > {FLOAT_SLACK:e}"),
            ));
        }
        if self.sustain_alert_secs < 0 {
            return Err(AppError::config("SUSTAIN_ALERT_SECS", "must be >= 0"));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(AppError::config("MAX_CONCURRENT_FETCHES", "must be >= 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(AppError::config("POLL_INTERVAL_MS", "must be > 0"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(AppError::config("FETCH_TIMEOUT_MS", "must be > 0"));
        }
        if self.watchlist_filter && self.watchlist_path.is_none() {
            return Err(AppError::config(
                "WATCHLIST_FILTER",
                "requires WATCHLIST_PATH to be set",
            ));
        }
        Ok(())
    }
}

fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN)
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| AppError::config(key, format!("{raw:?}: {e}")))
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |v| parse(key, &v))
}

fn parse_time(key: &'static str, raw: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
        .map_err(|e| AppError::config(key, format!("{raw:?}: {e} (expected HH:MM:SS)")))
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::config(key, format!("{other:?} is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();

        assert_eq!(cfg.session_start, hms(9, 15, 0));
        assert_eq!(cfg.session_end, hms(15, 0, 0));
        assert_eq!(cfg.gain_threshold_pct, 7.0);
        assert_eq!(cfg.ceiling_tolerance, 0.01);
        assert_eq!(cfg.sustain_alert_secs, 60);
        assert!(!cfg.bypass_session_clock);
        assert_eq!(cfg.alert_locale, AlertLocale::En);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("SESSION_START", "09:30:00"),
            ("GAIN_THRESHOLD_PCT", "9.5"),
            ("BYPASS_SESSION_CLOCK", "yes"),
            ("POLL_INTERVAL_MS", "500"),
            ("ALERT_LOCALE", "zh"),
            ("WATCHLIST_PATH", "hot.txt"),
            ("WATCHLIST_FILTER", "true"),
        ]))
        .unwrap();

        assert_eq!(cfg.session_start, hms(9, 30, 0));
        assert_eq!(cfg.gain_threshold_pct, 9.5);
        assert!(cfg.bypass_session_clock);
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
        assert_eq!(cfg.alert_locale, AlertLocale::Zh);
        assert_eq!(cfg.watchlist_path, Some(PathBuf::from("hot.txt")));
        assert!(cfg.watchlist_filter);
    }

    #[test]
    fn malformed_time_is_a_config_error() {
        let err = AppConfig::from_lookup(lookup(&[("SESSION_END", "3pm")])).unwrap_err();
        assert!(matches!(err, AppError::Config { key: "SESSION_END", .. }));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("SESSION_START", "15:00:00"),
            ("SESSION_END", "09:15:00"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config { key: "SESSION_START", .. }));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err =
            AppConfig::from_lookup(lookup(&[("MAX_CONCURRENT_FETCHES", "0")])).unwrap_err();
        assert!(matches!(err, AppError::Config { key: "MAX_CONCURRENT_FETCHES", .. }));
    }

    #[test]
    fn tolerance_must_exceed_float_slack() {
        for raw in ["0", "1e-9", "1e-12"] {
            let err = AppConfig::from_lookup(lookup(&[("CEILING_TOLERANCE", raw)])).unwrap_err();
            assert!(matches!(err, AppError::Config { key: "CEILING_TOLERANCE", .. }), "{raw}");
        }

        let cfg = AppConfig::from_lookup(lookup(&[("CEILING_TOLERANCE", "0.005")])).unwrap();
        assert_eq!(cfg.ceiling_tolerance, 0.005);
    }

    #[test]
    fn watchlist_filter_needs_a_path() {
        let err = AppConfig::from_lookup(lookup(&[("WATCHLIST_FILTER", "1")])).unwrap_err();
        assert!(matches!(err, AppError::Config { key: "WATCHLIST_FILTER", .. }));
    }
}
