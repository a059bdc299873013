use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{Config, GSC, GSC_DATA_LAG_DAYS, GSC_LOOKBACK_DAYS, GSC_MIN_INTERVAL_SECS};
use crate::error::{AppError, Result};
use crate::fetcher::transport::{HttpRequest, HttpTransport};
use crate::latency::LatencyStats;
use crate::limiter::{RateLimiter, RateLimiterRegistry};
use crate::retry::RetryPolicy;
use crate::types::{extract_domain, CollectorResponse, GscMetric, GscSummary, SerpResult};

const PROVIDER_LABEL: &str = "GSC";

/// Performance data for a verified site. `query` arguments are site URLs
/// (`https://example.com/` or `sc-domain:example.com`).
pub struct GscAdapter {
    api_url: String,
    credentials_path: Option<PathBuf>,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    latency: Arc<LatencyStats>,
}

/// Rows of one search-analytics query plus the date window they cover.
struct RowBatch {
    rows: Vec<Value>,
    start: NaiveDate,
    end: NaiveDate,
}

impl GscAdapter {
    pub fn new(cfg: &Config, transport: Arc<dyn HttpTransport>, limiters: &RateLimiterRegistry) -> Self {
        Self {
            api_url: cfg.gsc_api_url.trim_end_matches('/').to_string(),
            credentials_path: cfg.gsc_credentials_path.clone(),
            timeout: cfg.request_timeout(),
            transport,
            limiter: limiters.get_or_create(GSC, Duration::from_secs_f64(GSC_MIN_INTERVAL_SECS)),
            retry: RetryPolicy::from_config(cfg),
            latency: Arc::new(LatencyStats::new(GSC)),
        }
    }

    pub fn health_check(&self) -> bool {
        match &self.credentials_path {
            None => {
                warn!("GSC credentials path not configured");
                false
            }
            Some(path) if !path.exists() => {
                warn!(path = %path.display(), "GSC credentials file not found");
                false
            }
            Some(_) => true,
        }
    }

    pub fn latency(&self) -> &Arc<LatencyStats> {
        &self.latency
    }

    /// Top (query, page) rows as `SerpResult`s: title is the search query, url the page.
    pub async fn collect(&self, site_url: &str, num_results: u32, country: &str, _language: &str) -> CollectorResponse {
        if !self.health_check() {
            return CollectorResponse::error_response("GSC credentials not configured", GSC, site_url);
        }

        let start = Instant::now();
        match self.fetch_rows(site_url, num_results, country).await {
            Ok(batch) => {
                let results = rows_to_results(&batch.rows);
                info!(site_url, count = results.len(), provider = GSC, "collected performance rows");
                CollectorResponse::success_response(results, GSC, site_url, start.elapsed().as_millis() as u64)
            }
            Err(e) => {
                warn!(site_url, provider = GSC, "collect failed: {e}");
                CollectorResponse::error_response(format!("GSC error: {e}"), GSC, site_url)
            }
        }
    }

    pub async fn collect_metrics(&self, site_url: &str, num_results: u32, country: &str) -> Result<Vec<GscMetric>> {
        if !self.health_check() {
            return Err(AppError::Configuration("GSC credentials not configured".to_string()));
        }
        let batch = self.fetch_rows(site_url, num_results, country).await?;
        let metrics = rows_to_metrics(&batch.rows, country);
        info!(site_url, count = metrics.len(), "performance metrics loaded");
        Ok(metrics)
    }

    /// Totals and averages over the reporting window. Fails with `InsufficientData` on zero rows.
    pub async fn summary(&self, site_url: &str, num_results: u32, country: &str) -> Result<GscSummary> {
        if !self.health_check() {
            return Err(AppError::Configuration("GSC credentials not configured".to_string()));
        }
        let batch = self.fetch_rows(site_url, num_results, country).await?;
        let metrics = rows_to_metrics(&batch.rows, country);
        GscSummary::from_metrics(site_url, batch.start, batch.end, metrics)
    }

    async fn fetch_rows(&self, site_url: &str, num_results: u32, country: &str) -> Result<RowBatch> {
        let token = self.access_token().await?;
        let (start, end) = report_window(Utc::now().date_naive());
        let body = build_query(start, end, num_results, country);
        let url = format!("{}/sites/{}/searchAnalytics/query", self.api_url, encode_site(site_url));

        let data = self
            .retry
            .run("gsc.query", || self.make_request(&url, &token, &body))
            .await?;

        let rows = data.get("rows").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(RowBatch { rows, start, end })
    }

    async fn make_request(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        self.limiter.wait().await;

        let req = HttpRequest::post_json(url, body.clone(), self.timeout)
            .header("Authorization", format!("Bearer {token}"));

        let started = Instant::now();
        let resp = self.transport.send(req).await;
        let elapsed = started.elapsed();
        self.latency.record(elapsed);
        debug!(provider = GSC, elapsed_ms = elapsed.as_millis() as u64, "request finished");

        let resp = resp?;
        if let Some(err) = resp.error_for(PROVIDER_LABEL) {
            return Err(err);
        }
        resp.json()
    }

    /// Reads the bearer token from the credentials JSON (`access_token`).
    async fn access_token(&self) -> Result<String> {
        let Some(path) = &self.credentials_path else {
            return Err(AppError::Configuration("GSC credentials not configured".to_string()));
        };
        let raw = tokio::fs::read_to_string(path).await?;
        let creds: Value = serde_json::from_str(&raw)?;
        creds
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Authentication(format!(
                    "no access_token in GSC credentials file {}",
                    path.display()
                ))
            })
    }
}

/// Last 28 days of data ending 3 days before `today` (reporting lag).
pub fn report_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = today - chrono::Duration::days(GSC_DATA_LAG_DAYS);
    let start = end - chrono::Duration::days(GSC_LOOKBACK_DAYS);
    (start, end)
}

fn build_query(start: NaiveDate, end: NaiveDate, num_results: u32, country: &str) -> Value {
    json!({
        "startDate": start.format("%Y-%m-%d").to_string(),
        "endDate": end.format("%Y-%m-%d").to_string(),
        "dimensions": ["query", "page"],
        "rowLimit": num_results,
        "dimensionFilterGroups": [{
            "filters": [{
                "dimension": "country",
                "expression": country.to_uppercase(),
            }]
        }],
    })
}

fn encode_site(site_url: &str) -> String {
    url::form_urlencoded::byte_serialize(site_url.as_bytes()).collect()
}

/// (query, page) from a row's `keys`. None for rows that are not objects or lack keys.
fn row_keys(row: &Value) -> Option<(String, Option<String>)> {
    let keys = row.get("keys")?.as_array()?;
    let query = keys.first()?.as_str()?.to_string();
    let page = keys.get(1).and_then(Value::as_str).map(str::to_string);
    Some((query, page))
}

fn number(row: &Value, key: &str) -> f64 {
    row.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn rows_to_results(rows: &[Value]) -> Vec<SerpResult> {
    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let Some((query, page)) = row_keys(row) else {
            warn!("skipping malformed GSC row");
            continue;
        };
        let url = page.unwrap_or_default();
        results.push(SerpResult {
            position: results.len() as u32 + 1,
            title: query,
            snippet: String::new(),
            domain: extract_domain(&url),
            url,
        });
    }
    results
}

fn rows_to_metrics(rows: &[Value], country: &str) -> Vec<GscMetric> {
    rows.iter()
        .filter_map(|row| {
            let Some((query, page)) = row_keys(row) else {
                warn!("skipping malformed GSC row");
                return None;
            };
            Some(GscMetric {
                query,
                page,
                clicks: number(row, "clicks").max(0.0) as u64,
                impressions: number(row, "impressions").max(0.0) as u64,
                ctr: number(row, "ctr").clamp(0.0, 1.0),
                position: number(row, "position").max(0.0),
                metric_date: None,
                country: Some(country.to_lowercase()),
                device: None,
            })
        })
        .collect()
}
