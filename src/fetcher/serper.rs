use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::{Config, SERPER, SERPER_MIN_INTERVAL_SECS};
use crate::error::{AppError, Result};
use crate::fetcher::transport::{HttpRequest, HttpTransport};
use crate::latency::LatencyStats;
use crate::limiter::{RateLimiter, RateLimiterRegistry};
use crate::retry::RetryPolicy;
use crate::types::{extract_domain, CollectorResponse, FullSerpResponse, SerpResult};

const PROVIDER_LABEL: &str = "Serper";

/// Recency filter, sent as the `tbs` request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeFilter {
    pub fn as_tbs(self) -> &'static str {
        match self {
            TimeFilter::Hour => "qdr:h",
            TimeFilter::Day => "qdr:d",
            TimeFilter::Week => "qdr:w",
            TimeFilter::Month => "qdr:m",
            TimeFilter::Year => "qdr:y",
        }
    }

    /// DuckDuckGo news only filters by day, week or month.
    pub fn as_news_df(self) -> Option<&'static str> {
        match self {
            TimeFilter::Day => Some("d"),
            TimeFilter::Week => Some("w"),
            TimeFilter::Month => Some("m"),
            TimeFilter::Hour | TimeFilter::Year => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "hour" => Some(TimeFilter::Hour),
            "day" => Some(TimeFilter::Day),
            "week" => Some(TimeFilter::Week),
            "month" => Some(TimeFilter::Month),
            "year" => Some(TimeFilter::Year),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Free-form location, e.g. "Austin, Texas, United States".
    pub location: Option<String>,
    pub time_filter: Option<TimeFilter>,
}

pub struct SerperAdapter {
    api_key: String,
    api_url: String,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    latency: Arc<LatencyStats>,
}

impl SerperAdapter {
    pub fn new(cfg: &Config, transport: Arc<dyn HttpTransport>, limiters: &RateLimiterRegistry) -> Self {
        Self {
            api_key: cfg.serper_api_key.clone(),
            api_url: cfg.serper_api_url.clone(),
            timeout: cfg.request_timeout(),
            transport,
            limiter: limiters.get_or_create(SERPER, Duration::from_secs_f64(SERPER_MIN_INTERVAL_SECS)),
            retry: RetryPolicy::from_config(cfg),
            latency: Arc::new(LatencyStats::new(SERPER)),
        }
    }

    pub fn health_check(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("Serper API key not configured");
            return false;
        }
        true
    }

    pub fn latency(&self) -> &Arc<LatencyStats> {
        &self.latency
    }

    /// Normalized organic results. Failures never escape: they come back as `success = false`.
    pub async fn collect(&self, query: &str, num_results: u32, country: &str, language: &str) -> CollectorResponse {
        self.collect_with(query, num_results, country, language, &SearchOptions::default())
            .await
    }

    pub async fn collect_with(
        &self,
        query: &str,
        num_results: u32,
        country: &str,
        language: &str,
        opts: &SearchOptions,
    ) -> CollectorResponse {
        if self.api_key.is_empty() {
            return CollectorResponse::error_response("Serper API key not configured", SERPER, query);
        }

        let start = Instant::now();
        let payload = build_payload(query, num_results, country, language, opts);
        let result = self
            .retry
            .run("serper.collect", || self.make_request(&payload))
            .await;

        match result {
            Ok(data) => {
                let organic = data.get("organic").and_then(Value::as_array).cloned().unwrap_or_default();
                let results = parse_organic(&organic);
                info!(query, count = results.len(), provider = SERPER, "collected organic results");
                CollectorResponse::success_response(results, SERPER, query, start.elapsed().as_millis() as u64)
            }
            Err(e) => {
                warn!(query, provider = SERPER, "collect failed: {e}");
                CollectorResponse::error_response(e.to_string(), SERPER, query)
            }
        }
    }

    /// One rate-limited request for the complete SERP. Retrying is the caller's concern.
    pub async fn collect_full(
        &self,
        query: &str,
        num_results: u32,
        country: &str,
        language: &str,
    ) -> Result<FullSerpResponse> {
        self.collect_full_with(query, num_results, country, language, &SearchOptions::default())
            .await
    }

    pub async fn collect_full_with(
        &self,
        query: &str,
        num_results: u32,
        country: &str,
        language: &str,
        opts: &SearchOptions,
    ) -> Result<FullSerpResponse> {
        if self.api_key.is_empty() {
            return Err(AppError::Configuration("Serper API key not configured".to_string()));
        }

        let payload = build_payload(query, num_results, country, language, opts);
        let data = self.make_request(&payload).await?;
        let response = FullSerpResponse::from_payload(query, data)?;

        info!(
            query,
            organic = response.organic.len(),
            paa = response.people_also_ask.len(),
            related = response.related_searches.len(),
            "full SERP collected"
        );
        Ok(response)
    }

    /// Related searches followed by (optionally) PAA questions, deduplicated in order.
    pub async fn related_keywords(
        &self,
        query: &str,
        include_paa: bool,
        country: &str,
        language: &str,
    ) -> Result<Vec<String>> {
        let serp = self.collect_full(query, 10, country, language).await?;

        let mut keywords: Vec<String> = Vec::new();
        let mut candidates = serp.related_queries();
        if include_paa {
            candidates.extend(serp.paa_questions());
        }
        for kw in candidates {
            if !keywords.contains(&kw) {
                keywords.push(kw);
            }
        }

        info!(query, count = keywords.len(), "related keywords found");
        Ok(keywords)
    }

    /// Rank of `target_domain` in the organic results, if it appears.
    pub async fn find_position(
        &self,
        query: &str,
        target_domain: &str,
        num_results: u32,
        country: &str,
        language: &str,
    ) -> Result<Option<u32>> {
        let serp = self.collect_full(query, num_results, country, language).await?;
        let results = parse_organic(&serp.organic.into_iter().map(Value::Object).collect::<Vec<_>>());
        let position = super::position_of(&results, target_domain);
        match position {
            Some(p) => info!(query, target_domain, position = p, "target found"),
            None => info!(query, target_domain, num_results, "target not found"),
        }
        Ok(position)
    }

    async fn make_request(&self, payload: &Value) -> Result<Value> {
        self.limiter.wait().await;

        let req = HttpRequest::post_json(&self.api_url, payload.clone(), self.timeout)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json");

        let start = Instant::now();
        let resp = self.transport.send(req).await;
        let elapsed = start.elapsed();
        self.latency.record(elapsed);
        debug!(provider = SERPER, elapsed_ms = elapsed.as_millis() as u64, "request finished");

        let resp = resp?;
        if let Some(err) = resp.error_for(PROVIDER_LABEL) {
            return Err(err);
        }
        resp.json()
    }
}

pub fn build_payload(query: &str, num_results: u32, country: &str, language: &str, opts: &SearchOptions) -> Value {
    let mut payload = json!({
        "q": query,
        "num": num_results.min(100),
        "gl": country.to_lowercase(),
        "hl": language.to_lowercase(),
        "autocorrect": true,
    });
    if let Some(obj) = payload.as_object_mut() {
        if let Some(location) = opts.location.as_deref().filter(|l| !l.trim().is_empty()) {
            obj.insert("location".to_string(), json!(location));
        }
        if let Some(filter) = opts.time_filter {
            obj.insert("tbs".to_string(), json!(filter.as_tbs()));
        }
    }
    payload
}

/// Normalizes raw organic entries. Entries that are not objects are skipped; an
/// entry without a link keeps its slot with an empty URL and domain. Missing
/// positions fall back to the next sequential rank.
pub fn parse_organic(items: &[Value]) -> Vec<SerpResult> {
    let mut results: Vec<SerpResult> = Vec::with_capacity(items.len());
    for item in items {
        let Some(entry) = item.as_object() else {
            warn!("skipping non-object organic entry");
            continue;
        };
        let r = parse_entry(entry, results.len());
        results.push(r);
    }
    results
}

fn parse_entry(entry: &Map<String, Value>, accepted: usize) -> SerpResult {
    let text = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let url = text("link");
    let position = entry
        .get("position")
        .and_then(Value::as_u64)
        .map(|p| p.min(u64::from(u32::MAX)) as u32)
        .unwrap_or(accepted as u32 + 1);
    let domain = if url.is_empty() { String::new() } else { extract_domain(&url) };

    SerpResult {
        position,
        title: text("title"),
        snippet: text("snippet"),
        domain,
        url,
    }
}
