use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use serp_scanner::analyzer::{BatchAnalysis, KeywordAnalyzer};
use serp_scanner::config::Config;
use serp_scanner::detector::{detect_from_metrics, prioritize};
use serp_scanner::error::{AppError, Result};
use serp_scanner::fetcher::{DuckDuckGoAdapter, GscAdapter, HttpTransport, Provider, ReqwestTransport, SerperAdapter};
use serp_scanner::latency::LatencyStats;
use serp_scanner::limiter::RateLimiterRegistry;
use serp_scanner::retry::RetryPolicy;
use serp_scanner::types::Opportunity;
use serp_scanner::validators::validate_keywords;

/// Performance-data opportunities kept in the report.
const MAX_PERFORMANCE_OPPORTUNITIES: usize = 10;

#[derive(Serialize)]
struct Report<'a> {
    keywords: &'a BatchAnalysis,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    performance_opportunities: Vec<Opportunity>,
}

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        return Err(AppError::Configuration(
            "usage: scanner <keyword>[, <keyword>...]".to_string(),
        ));
    }
    let keywords = validate_keywords(&args.join(","))?;

    // --- Shared infrastructure ---
    let limiters = RateLimiterRegistry::with_defaults();
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);

    // --- Providers ---
    let serper = Provider::Serper(SerperAdapter::new(&cfg, Arc::clone(&transport), &limiters));
    let ddg = Provider::DuckDuckGo(DuckDuckGoAdapter::new(&cfg, Arc::clone(&transport), &limiters));
    let gsc = GscAdapter::new(&cfg, Arc::clone(&transport), &limiters);

    for provider in [&serper, &ddg] {
        info!(provider = provider.name(), healthy = provider.health_check(), "provider status");
    }
    if !serper.health_check() {
        return Err(AppError::Configuration("SERPER_API_KEY is required for keyword analysis".to_string()));
    }

    // --- Keyword analysis ---
    let serper = Arc::new(serper);
    let analyzer = KeywordAnalyzer::new(Arc::clone(&serper), RetryPolicy::from_config(&cfg));
    let results = analyzer
        .batch_analyze(
            &keywords,
            cfg.target_url.as_deref(),
            &cfg.default_country,
            &cfg.default_language,
        )
        .await;
    for (keyword, analysis) in results.iter() {
        info!(
            keyword,
            difficulty = %analysis.competition.difficulty,
            position = ?analysis.target_position,
            opportunities = analysis.opportunity_count(),
            "keyword analyzed"
        );
    }

    // --- Performance data (optional) ---
    let performance_opportunities = match cfg.target_url.as_deref() {
        Some(site) if gsc.health_check() => {
            match gsc
                .collect_metrics(site, cfg.default_result_count, &cfg.default_country)
                .await
            {
                Ok(metrics) => prioritize(&detect_from_metrics(&metrics), MAX_PERFORMANCE_OPPORTUNITIES),
                Err(e) => {
                    warn!("Skipping performance opportunities: {e}");
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    };

    log_latency(serper.latency());
    log_latency(gsc.latency());

    let report = Report {
        keywords: &results,
        performance_opportunities,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(analyzed = results.len(), requested = keywords.len(), "Scan complete");
    Ok(())
}

fn log_latency(stats: &LatencyStats) {
    if stats.is_empty() {
        return;
    }
    let (p50, p95, p99) = stats.percentiles();
    info!(
        provider = stats.provider(),
        samples = stats.len(),
        p50_ms = p50.unwrap_or(0),
        p95_ms = p95.unwrap_or(0),
        p99_ms = p99.unwrap_or(0),
        "request latency"
    );
}
