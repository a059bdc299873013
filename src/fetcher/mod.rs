pub mod duckduckgo;
pub mod gsc;
pub mod serper;
pub mod transport;

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::latency::LatencyStats;
use crate::types::{extract_domain, normalize_domain, CollectorResponse, FullSerpResponse, SerpResult};

pub use duckduckgo::DuckDuckGoAdapter;
pub use gsc::GscAdapter;
pub use serper::{SearchOptions, SerperAdapter, TimeFilter};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Every supported data source. Only Serper can return a full SERP response;
/// callers check `supports_full()` rather than assuming it.
pub enum Provider {
    Serper(SerperAdapter),
    DuckDuckGo(DuckDuckGoAdapter),
    Gsc(GscAdapter),
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Serper(_) => crate::config::SERPER,
            Provider::DuckDuckGo(_) => crate::config::DUCKDUCKGO,
            Provider::Gsc(_) => crate::config::GSC,
        }
    }

    /// Configuration check only, never touches the network.
    pub fn health_check(&self) -> bool {
        match self {
            Provider::Serper(a) => a.health_check(),
            Provider::DuckDuckGo(a) => a.health_check(),
            Provider::Gsc(a) => a.health_check(),
        }
    }

    pub fn supports_full(&self) -> bool {
        matches!(self, Provider::Serper(_))
    }

    /// For the GSC provider `query` is the site URL.
    pub async fn collect(&self, query: &str, num_results: u32, country: &str, language: &str) -> CollectorResponse {
        match self {
            Provider::Serper(a) => a.collect(query, num_results, country, language).await,
            Provider::DuckDuckGo(a) => a.collect(query, num_results, country, language).await,
            Provider::Gsc(a) => a.collect(query, num_results, country, language).await,
        }
    }

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
        match self {
            Provider::Serper(a) => a.collect_full_with(query, num_results, country, language, opts).await,
            _ => Err(AppError::Configuration(format!(
                "{} does not provide full SERP responses",
                self.name()
            ))),
        }
    }

    pub fn latency(&self) -> &Arc<LatencyStats> {
        match self {
            Provider::Serper(a) => a.latency(),
            Provider::DuckDuckGo(a) => a.latency(),
            Provider::Gsc(a) => a.latency(),
        }
    }
}

/// Normalized domain of a target given either as a URL or a bare host.
pub fn target_domain(target: &str) -> String {
    let target = target.trim();
    if target.contains("://") {
        normalize_domain(&extract_domain(target))
    } else {
        let host = target.split('/').next().unwrap_or_default();
        normalize_domain(host)
    }
}

/// Exact match after normalization, or `candidate` is a subdomain of `target`.
/// `target` must already be normalized.
pub fn domain_matches(candidate: &str, target: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    let candidate = normalize_domain(candidate);
    candidate == target || candidate.ends_with(&format!(".{target}"))
}

/// First result (in ascending position order) whose domain matches `target`.
pub fn position_of(results: &[SerpResult], target: &str) -> Option<u32> {
    let target = target_domain(target);
    let mut ordered: Vec<&SerpResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.position);
    ordered
        .into_iter()
        .find(|r| domain_matches(&r.domain, &target))
        .map(|r| r.position)
}
