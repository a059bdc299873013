use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{Config, BATCH_DELAY_MS, DDG_NEWS_MAX_RESULTS, DUCKDUCKGO, DUCKDUCKGO_MIN_INTERVAL_SECS};
use crate::error::{AppError, Result};
use crate::fetcher::serper::TimeFilter;
use crate::fetcher::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::latency::LatencyStats;
use crate::limiter::{RateLimiter, RateLimiterRegistry};
use crate::retry::RetryPolicy;
use crate::types::{extract_domain, normalize_domain, CollectorResponse, SerpResult};

const PROVIDER_LABEL: &str = "DuckDuckGo";

/// Domain overlap between a DuckDuckGo result set and another provider's.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainComparison {
    pub query: String,
    pub other_count: usize,
    pub ddg_count: usize,
    pub overlap_count: usize,
    pub overlap_domains: Vec<String>,
    pub other_only: Vec<String>,
    pub ddg_only: Vec<String>,
    /// Share of the other provider's domains also present here, 0..=100.
    pub overlap_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsResult {
    pub title: String,
    pub url: String,
    pub source: String,
    pub excerpt: String,
    pub domain: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Text and news results for one query.
#[derive(Debug, Clone, Serialize)]
pub struct DdgFullResponse {
    pub query: String,
    pub fetched_at: DateTime<Utc>,
    pub text_results: Vec<SerpResult>,
    pub news_results: Vec<NewsResult>,
}

impl DdgFullResponse {
    /// Unique domains (without `www.`) of the first 10 text results.
    pub fn top_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = Vec::new();
        for r in self.text_results.iter().take(10) {
            let d = normalize_domain(&r.domain);
            if !d.is_empty() && !domains.contains(&d) {
                domains.push(d);
            }
        }
        domains
    }

    pub fn total_results(&self) -> usize {
        self.text_results.len() + self.news_results.len()
    }
}

pub struct DuckDuckGoAdapter {
    html_url: String,
    base_url: String,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    latency: Arc<LatencyStats>,
}

impl DuckDuckGoAdapter {
    pub fn new(cfg: &Config, transport: Arc<dyn HttpTransport>, limiters: &RateLimiterRegistry) -> Self {
        Self {
            html_url: cfg.ddg_html_url.clone(),
            base_url: cfg.ddg_base_url.trim_end_matches('/').to_string(),
            timeout: cfg.request_timeout(),
            transport,
            limiter: limiters.get_or_create(DUCKDUCKGO, Duration::from_secs_f64(DUCKDUCKGO_MIN_INTERVAL_SECS)),
            retry: RetryPolicy::from_config(cfg),
            latency: Arc::new(LatencyStats::new(DUCKDUCKGO)),
        }
    }

    /// Keyless endpoint: healthy when the configured URL parses.
    pub fn health_check(&self) -> bool {
        url::Url::parse(&self.html_url).is_ok()
    }

    pub fn latency(&self) -> &Arc<LatencyStats> {
        &self.latency
    }

    pub async fn collect(&self, query: &str, num_results: u32, country: &str, language: &str) -> CollectorResponse {
        if !self.health_check() {
            return CollectorResponse::error_response(
                format!("DuckDuckGo endpoint not configured: {}", self.html_url),
                DUCKDUCKGO,
                query,
            );
        }

        let start = Instant::now();
        let region = format!("{country}-{language}").to_lowercase();
        let result = self
            .retry
            .run("duckduckgo.collect", || self.fetch_page(query, &region))
            .await;

        match result {
            Ok(html) => {
                let mut results = parse_results_html(&html);
                results.truncate(num_results.clamp(1, 100) as usize);
                info!(query, count = results.len(), provider = DUCKDUCKGO, "collected organic results");
                CollectorResponse::success_response(results, DUCKDUCKGO, query, start.elapsed().as_millis() as u64)
            }
            Err(e) => {
                warn!(query, provider = DUCKDUCKGO, "collect failed: {e}");
                CollectorResponse::error_response(format!("DuckDuckGo error: {e}"), DUCKDUCKGO, query)
            }
        }
    }

    pub async fn find_position(
        &self,
        query: &str,
        target_domain: &str,
        num_results: u32,
        country: &str,
        language: &str,
    ) -> Result<Option<u32>> {
        let resp = self.collect(query, num_results, country, language).await;
        if !resp.success {
            return Err(AppError::Collector(resp.error.unwrap_or_default()));
        }
        let position = super::position_of(&resp.data, target_domain);
        match position {
            Some(p) => info!(query, target_domain, position = p, "target found"),
            None => info!(query, target_domain, num_results, "target not found"),
        }
        Ok(position)
    }

    /// Cross-checks another provider's results against a fresh DuckDuckGo fetch.
    pub async fn compare_domains(
        &self,
        query: &str,
        other_results: &[SerpResult],
        num_results: u32,
        country: &str,
        language: &str,
    ) -> Result<DomainComparison> {
        let resp = self.collect(query, num_results, country, language).await;
        if !resp.success {
            return Err(AppError::Collector(resp.error.unwrap_or_default()));
        }
        Ok(compare_result_sets(query, other_results, &resp.data))
    }

    /// News search. Needs a search token from the main site, so it costs two requests.
    pub async fn search_news(
        &self,
        query: &str,
        num_results: u32,
        time_filter: Option<TimeFilter>,
        country: &str,
        language: &str,
    ) -> Result<Vec<NewsResult>> {
        let region = format!("{country}-{language}").to_lowercase();
        let max = num_results.clamp(1, DDG_NEWS_MAX_RESULTS) as usize;
        let df = time_filter.and_then(TimeFilter::as_news_df);
        if let (Some(filter), None) = (time_filter, df) {
            debug!(?filter, "news search ignores unsupported time filter");
        }

        let body = self
            .retry
            .run("duckduckgo.news", || self.fetch_news(query, &region, df))
            .await?;
        let mut news = parse_news_json(&body)?;
        news.truncate(max);
        info!(query, count = news.len(), provider = DUCKDUCKGO, "collected news results");
        Ok(news)
    }

    /// Text results plus, optionally, news. A failing news search only leaves the news list empty.
    pub async fn collect_all(
        &self,
        query: &str,
        num_results: u32,
        include_news: bool,
        country: &str,
        language: &str,
    ) -> Result<DdgFullResponse> {
        let text = self.collect(query, num_results, country, language).await;
        if !text.success {
            return Err(AppError::Collector(text.error.unwrap_or_default()));
        }

        let news_results = if include_news {
            match self.search_news(query, num_results, None, country, language).await {
                Ok(news) => news,
                Err(e) => {
                    warn!(query, "DuckDuckGo news search failed: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let full = DdgFullResponse {
            query: query.to_string(),
            fetched_at: Utc::now(),
            text_results: text.data,
            news_results,
        };
        info!(
            query,
            text = full.text_results.len(),
            news = full.news_results.len(),
            "full DuckDuckGo search"
        );
        Ok(full)
    }

    /// Sequential collection with a fixed pause between queries. Every query gets an entry.
    pub async fn batch_collect(
        &self,
        queries: &[String],
        num_results: u32,
        country: &str,
        language: &str,
    ) -> Vec<(String, CollectorResponse)> {
        info!(count = queries.len(), provider = DUCKDUCKGO, "batch collecting");
        let mut out = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            let resp = self.collect(query, num_results, country, language).await;
            if !resp.success {
                error!(query = query.as_str(), "batch item failed: {}", resp.error.as_deref().unwrap_or(""));
            }
            out.push((query.clone(), resp));
        }
        let ok = out.iter().filter(|(_, r)| r.success).count();
        info!(succeeded = ok, total = queries.len(), "batch complete");
        out
    }

    async fn fetch_page(&self, query: &str, region: &str) -> Result<String> {
        let req = HttpRequest::get(&self.html_url, self.timeout)
            .query_param("q", query)
            .query_param("kl", region);
        Ok(self.send(req).await?.body)
    }

    async fn fetch_news(&self, query: &str, region: &str, df: Option<&str>) -> Result<Value> {
        let token_page = self
            .send(HttpRequest::get(format!("{}/", self.base_url), self.timeout).query_param("q", query))
            .await?;
        let vqd = extract_vqd(&token_page.body)
            .ok_or_else(|| AppError::Collector("DuckDuckGo search token not found".to_string()))?;

        let mut req = HttpRequest::get(format!("{}/news.js", self.base_url), self.timeout)
            .query_param("l", region)
            .query_param("o", "json")
            .query_param("noamp", "1")
            .query_param("q", query)
            .query_param("vqd", vqd);
        if let Some(df) = df {
            req = req.query_param("df", df);
        }
        self.send(req).await?.json()
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        self.limiter.wait().await;

        let start = Instant::now();
        let resp = self.transport.send(req).await;
        let elapsed = start.elapsed();
        self.latency.record(elapsed);
        debug!(provider = DUCKDUCKGO, elapsed_ms = elapsed.as_millis() as u64, "request finished");

        let resp = resp?;
        if let Some(err) = resp.error_for(PROVIDER_LABEL) {
            return Err(err);
        }
        Ok(resp)
    }
}

/// Pulls the `vqd` search token out of the main-site page (`vqd="4-123..."` or `vqd=4-123&`).
fn extract_vqd(page: &str) -> Option<String> {
    let start = page.find("vqd=")? + "vqd=".len();
    let rest = page[start..].trim_start_matches(['"', '\'']);
    let token: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Parses a `news.js` payload. Entries without a URL are skipped.
fn parse_news_json(body: &Value) -> Result<Vec<NewsResult>> {
    let items = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Collector("DuckDuckGo news payload has no results".to_string()))?;

    let mut news = Vec::with_capacity(items.len());
    for item in items {
        let text = |key: &str| item.get(key).and_then(Value::as_str).unwrap_or_default().trim().to_string();
        let url = text("url");
        if url.is_empty() {
            warn!("skipping DuckDuckGo news entry without url");
            continue;
        }
        news.push(NewsResult {
            title: text("title"),
            source: text("source"),
            excerpt: squash_whitespace(&text("excerpt")),
            domain: extract_domain(&url),
            published_at: item
                .get("date")
                .and_then(Value::as_i64)
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            url,
        });
    }
    Ok(news)
}

/// Parses the HTML result page. Ads and blocks without a link are skipped;
/// positions are sequential over the kept results.
pub fn parse_results_html(html: &str) -> Vec<SerpResult> {
    let (Ok(block_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse(".result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for block in document.select(&block_sel) {
        let classes = block.value().attr("class").unwrap_or_default();
        if classes.contains("result--ad") {
            continue;
        }
        let Some(link) = block.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").map(resolve_href).filter(|u| !u.is_empty()) else {
            warn!("skipping DuckDuckGo result without href");
            continue;
        };
        let title = squash_whitespace(&link.text().collect::<String>());
        let snippet = block
            .select(&snippet_sel)
            .next()
            .map(|s| squash_whitespace(&s.text().collect::<String>()))
            .unwrap_or_default();

        results.push(SerpResult {
            position: results.len() as u32 + 1,
            title,
            snippet,
            domain: extract_domain(&url),
            url,
        });
    }
    results
}

/// Unwraps DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=<target>`).
fn resolve_href(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let Ok(parsed) = url::Url::parse(&absolute) else {
        return String::new();
    };
    if parsed.path().starts_with("/l/") {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
            return target.into_owned();
        }
    }
    absolute
}

fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn compare_result_sets(query: &str, other: &[SerpResult], ddg: &[SerpResult]) -> DomainComparison {
    let other_domains: BTreeSet<String> = other.iter().map(|r| normalize_domain(&r.domain)).collect();
    let ddg_domains: BTreeSet<String> = ddg.iter().map(|r| normalize_domain(&r.domain)).collect();

    let overlap: Vec<String> = other_domains.intersection(&ddg_domains).cloned().collect();
    let other_only: Vec<String> = other_domains.difference(&ddg_domains).cloned().collect();
    let ddg_only: Vec<String> = ddg_domains.difference(&other_domains).cloned().collect();

    DomainComparison {
        query: query.to_string(),
        other_count: other.len(),
        ddg_count: ddg.len(),
        overlap_count: overlap.len(),
        overlap_percentage: overlap.len() as f64 / other_domains.len().max(1) as f64 * 100.0,
        overlap_domains: overlap,
        other_only,
        ddg_only,
    }
}
