use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::validators::{validate_country_code, validate_language_code, validate_url};

pub const SERPER_API_URL: &str = "https://google.serper.dev/search";
pub const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
/// Serves the search token page and the `news.js` endpoint.
pub const DDG_BASE_URL: &str = "https://duckduckgo.com";
pub const GSC_API_URL: &str = "https://searchconsole.googleapis.com/webmasters/v3";

/// Provider names, also the keys of the rate limiter registry.
pub const SERPER: &str = "serper";
pub const DUCKDUCKGO: &str = "duckduckgo";
pub const GSC: &str = "gsc";

/// Minimum spacing between calls to one provider (seconds), shared across all adapter instances.
pub const SERPER_MIN_INTERVAL_SECS: f64 = 0.5;
pub const DUCKDUCKGO_MIN_INTERVAL_SECS: f64 = 1.0;
pub const GSC_MIN_INTERVAL_SECS: f64 = 0.2;

/// Cap on news results per DuckDuckGo call.
pub const DDG_NEWS_MAX_RESULTS: u32 = 20;

/// Fixed sleep between keywords in a batch. Not a rate limiter.
pub const BATCH_DELAY_MS: u64 = 500;

/// Wait used when a 429 arrives without a Retry-After header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Multiplier applied to the retry delay after each failed attempt.
pub const RETRY_BACKOFF_FACTOR: f64 = 2.0;

/// Result depth used by the keyword analyzer for its full SERP fetch.
pub const ANALYZER_RESULT_COUNT: u32 = 100;

/// Keyword length bounds enforced by the analyzer (after trimming).
pub const KEYWORD_MIN_LEN: usize = 2;
pub const KEYWORD_MAX_LEN: usize = 200;

/// GSC reporting window: last 28 days, ending 3 days ago (data lag).
pub const GSC_LOOKBACK_DAYS: i64 = 28;
pub const GSC_DATA_LAG_DAYS: i64 = 3;

/// Competition score → difficulty cutoffs (inclusive lower bounds).
pub mod difficulty_thresholds {
    pub const HIGH_MIN: u8 = 70;
    pub const MEDIUM_MIN: u8 = 40;
}

/// Performance-metric opportunity predicates.
pub mod detection_thresholds {
    pub const LOW_CTR_MAX: f64 = 0.02;
    pub const LOW_CTR_MIN_IMPRESSIONS: u64 = 100;
    pub const FIRST_PAGE_MAX_POSITION: f64 = 10.0;
    pub const STRIKING_DISTANCE_MIN: f64 = 4.0;
    pub const STRIKING_DISTANCE_MAX: f64 = 10.0;
    pub const HIGH_IMPRESSIONS_MIN: u64 = 1000;
    /// Clicks below this share of impressions count as "low clicks".
    pub const HIGH_IMPRESSIONS_CLICK_RATIO: f64 = 0.01;
    /// Heuristic CTR uplift used for the high-impressions impact estimate.
    pub const HIGH_IMPRESSIONS_UPLIFT: f64 = 0.02;
    /// Flat CTR assumed for a top-3 position.
    pub const TOP3_TARGET_CTR: f64 = 0.10;
    /// SERP path: related-search count above which keyword expansion is suggested.
    pub const EXPANSION_MIN_RELATED: usize = 3;
    /// Organic-volume growth (percent) at which a keyword counts as trending.
    pub const TREND_MIN_GROWTH_PCT: f64 = 10.0;
    pub const TREND_HIGH_GROWTH_PCT: f64 = 50.0;
}

/// Fixed per-type confidence. Not derived from data variance.
pub mod confidence {
    pub const LOW_CTR: f64 = 0.85;
    pub const POSITION_4_10: f64 = 0.80;
    pub const HIGH_IMPRESSIONS: f64 = 0.75;
    pub const SERP: f64 = 0.80;
    pub const TRENDING: f64 = 0.70;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub serper_api_key: String,
    pub serper_api_url: String,
    pub ddg_html_url: String,
    pub ddg_base_url: String,
    pub gsc_api_url: String,
    /// Path to the GSC credentials JSON (GSC_CREDENTIALS_PATH)
    pub gsc_credentials_path: Option<PathBuf>,
    /// Results per provider call, 1..=100 (DEFAULT_RESULT_COUNT)
    pub default_result_count: u32,
    pub default_country: String,
    pub default_language: String,
    /// 5..=120 (REQUEST_TIMEOUT_SECONDS)
    pub request_timeout_secs: u64,
    /// 1..=10 (MAX_RETRIES)
    pub max_retries: u32,
    /// 1..=60 (RETRY_DELAY_SECONDS)
    pub retry_delay_secs: u64,
    pub log_level: String,
    /// Site whose ranking is tracked during analysis (TARGET_URL)
    pub target_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serper_api_key: String::new(),
            serper_api_url: SERPER_API_URL.to_string(),
            ddg_html_url: DDG_HTML_URL.to_string(),
            ddg_base_url: DDG_BASE_URL.to_string(),
            gsc_api_url: GSC_API_URL.to_string(),
            gsc_credentials_path: None,
            default_result_count: 10,
            default_country: "us".to_string(),
            default_language: "en".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 5,
            log_level: "info".to_string(),
            target_url: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Self {
            serper_api_key: std::env::var("SERPER_API_KEY").unwrap_or_default(),
            serper_api_url: std::env::var("SERPER_API_URL").unwrap_or(defaults.serper_api_url),
            ddg_html_url: std::env::var("DDG_HTML_URL").unwrap_or(defaults.ddg_html_url),
            ddg_base_url: std::env::var("DDG_BASE_URL").unwrap_or(defaults.ddg_base_url),
            gsc_api_url: std::env::var("GSC_API_URL").unwrap_or(defaults.gsc_api_url),
            gsc_credentials_path: std::env::var("GSC_CREDENTIALS_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            default_result_count: parse_in_range("DEFAULT_RESULT_COUNT", defaults.default_result_count, 1, 100)?,
            default_country: match std::env::var("DEFAULT_COUNTRY") {
                Ok(code) => validate_country_code(&code)?,
                Err(_) => defaults.default_country,
            },
            default_language: match std::env::var("DEFAULT_LANGUAGE") {
                Ok(code) => validate_language_code(&code)?,
                Err(_) => defaults.default_language,
            },
            request_timeout_secs: parse_in_range("REQUEST_TIMEOUT_SECONDS", defaults.request_timeout_secs, 5, 120)?,
            max_retries: parse_in_range("MAX_RETRIES", defaults.max_retries, 1, 10)?,
            retry_delay_secs: parse_in_range("RETRY_DELAY_SECONDS", defaults.retry_delay_secs, 1, 60)?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            target_url: std::env::var("TARGET_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| validate_url(&s))
                .transpose()?,
        };
        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Reads `key` from the environment, falling back to `default` when unset.
/// A set value that fails to parse or lies outside `min..=max` is a configuration error.
fn parse_in_range<T>(key: &str, default: T, min: T, max: T) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|_| AppError::Configuration(format!("{key} must be a number, got {raw:?}")))?;
    check_range(key, value, min, max)
}

fn check_range<T>(key: &str, value: T, min: T, max: T) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(AppError::Configuration(format!(
            "{key} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_accepts_bounds() {
        assert_eq!(check_range("MAX_RETRIES", 1u32, 1, 10).unwrap(), 1);
        assert_eq!(check_range("MAX_RETRIES", 10u32, 1, 10).unwrap(), 10);
    }

    #[test]
    fn range_check_rejects_out_of_range() {
        let err = check_range("REQUEST_TIMEOUT_SECONDS", 4u64, 5, 120).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECONDS"));
    }

    #[test]
    fn defaults_are_within_documented_ranges() {
        let cfg = Config::default();
        assert!((1..=100).contains(&cfg.default_result_count));
        assert!((5..=120).contains(&cfg.request_timeout_secs));
        assert!((1..=10).contains(&cfg.max_retries));
        assert!((1..=60).contains(&cfg.retry_delay_secs));
        assert!(cfg.serper_api_key.is_empty());
        assert!(cfg.gsc_credentials_path.is_none());
    }
}
