use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use crate::analyzer::batch::BatchAnalysis;
use crate::analyzer::target::resolve_target_position;
use crate::analyzer::trend::TrendSnapshot;
use crate::config::{ANALYZER_RESULT_COUNT, BATCH_DELAY_MS, KEYWORD_MAX_LEN, KEYWORD_MIN_LEN};
use crate::detector::detect_from_serp;
use crate::error::{AppError, Result};
use crate::fetcher::{Provider, SearchOptions, TimeFilter};
use crate::retry::RetryPolicy;
use crate::scorer::{score, ScoringWeights};
use crate::types::{KeywordAnalysis, SerpSummary};
use crate::validators::{validate_keyword, validate_url};

/// Fetch → score → detect → assemble, for one keyword or a sequential batch.
pub struct KeywordAnalyzer {
    provider: Arc<Provider>,
    retry: RetryPolicy,
    weights: ScoringWeights,
    batch_delay: Duration,
}

impl KeywordAnalyzer {
    pub fn new(provider: Arc<Provider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            retry,
            weights: ScoringWeights::default(),
            batch_delay: Duration::from_millis(BATCH_DELAY_MS),
        }
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub async fn analyze(
        &self,
        keyword: &str,
        target_url: Option<&str>,
        country: &str,
        language: &str,
    ) -> Result<KeywordAnalysis> {
        let keyword = validate_keyword(keyword, KEYWORD_MIN_LEN, KEYWORD_MAX_LEN)?;
        let target_url = target_url.map(validate_url).transpose()?;

        self.require_full()?;

        info!(keyword = keyword.as_str(), provider = self.provider.name(), "starting keyword analysis");

        let provider = &self.provider;
        let query = keyword.as_str();
        let serp = self
            .retry
            .run("analyzer.collect_full", || {
                provider.collect_full(query, ANALYZER_RESULT_COUNT, country, language)
            })
            .await?;

        let competition = score(&serp, &self.weights);
        let target_position = target_url
            .as_deref()
            .and_then(|url| resolve_target_position(&serp.organic, url));
        let opportunities = detect_from_serp(&keyword, target_position, &competition, &serp);

        info!(
            keyword = keyword.as_str(),
            difficulty = %competition.difficulty,
            competition_score = competition.competition_score,
            ?target_position,
            opportunities = opportunities.len(),
            "analysis complete"
        );

        Ok(KeywordAnalysis {
            target_position,
            is_ranking: target_position.is_some(),
            related_keywords: serp.related_queries(),
            paa_questions: serp.paa_questions(),
            serp_summary: SerpSummary::from_response(&serp),
            competition,
            opportunities,
            target_url,
            keyword,
            analyzed_at: Utc::now(),
        })
    }

    /// One time-filtered SERP fetch, reduced to a trend snapshot.
    pub async fn snapshot(
        &self,
        keyword: &str,
        time_filter: TimeFilter,
        country: &str,
        language: &str,
    ) -> Result<TrendSnapshot> {
        let keyword = validate_keyword(keyword, KEYWORD_MIN_LEN, KEYWORD_MAX_LEN)?;
        self.require_full()?;

        let opts = SearchOptions {
            location: None,
            time_filter: Some(time_filter),
        };
        let provider = &self.provider;
        let query = keyword.as_str();
        let serp = self
            .retry
            .run("analyzer.snapshot", || {
                provider.collect_full_with(query, ANALYZER_RESULT_COUNT, country, language, &opts)
            })
            .await?;
        Ok(TrendSnapshot::from_response(&serp, time_filter))
    }

    /// Analyzes keywords one after another with a fixed pause in between.
    /// Failed keywords are logged and left out; the batch itself never fails.
    pub async fn batch_analyze(
        &self,
        keywords: &[String],
        target_url: Option<&str>,
        country: &str,
        language: &str,
    ) -> BatchAnalysis {
        info!(count = keywords.len(), "batch analyzing keywords");

        let mut results = BatchAnalysis::new();
        for (i, keyword) in keywords.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }
            match self.analyze(keyword, target_url, country, language).await {
                Ok(analysis) => results.insert(keyword.clone(), analysis),
                Err(e) => error!(keyword = keyword.as_str(), "failed to analyze: {e}"),
            }
        }

        info!(succeeded = results.len(), total = keywords.len(), "batch complete");
        results
    }

    fn require_full(&self) -> Result<()> {
        if self.provider.supports_full() {
            return Ok(());
        }
        Err(AppError::Configuration(format!(
            "keyword analysis needs full SERP data, which {} does not provide",
            self.provider.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fetcher::transport::mock::MockTransport;
    use crate::fetcher::transport::HttpResponse;
    use crate::fetcher::{DuckDuckGoAdapter, SerperAdapter};
    use crate::limiter::RateLimiterRegistry;
    use crate::scorer::ScoringWeights;
    use crate::types::{Difficulty, OpportunityType};
    use crate::validators::validate_keywords;
    use serde_json::json;

    fn serp_body(query: &str) -> serde_json::Value {
        let organic: Vec<serde_json::Value> = (1..=10)
            .map(|i| {
                let link = match i {
                    6 => "https://www.example.com/guide".to_string(),
                    _ => format!("https://site{i}.com/"),
                };
                json!({"position": i, "title": format!("Result {i}"), "link": link})
            })
            .collect();
        json!({
            "searchParameters": {"q": query},
            "organic": organic,
            "knowledgeGraph": {"title": query},
            "peopleAlsoAsk": [{"question": "What is it?"}, {"question": "How does it work?"}],
            "relatedSearches": [{"query": "a"}, {"query": "b"}, {"query": "c"}, {"query": "d"}]
        })
    }

    fn transport() -> Arc<MockTransport> {
        Arc::new(MockTransport::with_handler(|req| {
            let q = req
                .json_body()
                .and_then(|b| b["q"].as_str())
                .unwrap_or_default()
                .to_string();
            if q == "broken keyword" {
                Ok(HttpResponse::new(500, "internal error"))
            } else {
                Ok(HttpResponse::new(200, serp_body(&q).to_string()))
            }
        }))
    }

    fn analyzer(transport: Arc<MockTransport>) -> KeywordAnalyzer {
        let cfg = Config {
            serper_api_key: "test-key".to_string(),
            ..Config::default()
        };
        let provider = Provider::Serper(SerperAdapter::new(&cfg, transport, &RateLimiterRegistry::with_defaults()));
        KeywordAnalyzer::new(Arc::new(provider), RetryPolicy::for_collectors(3, Duration::from_secs(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_assembles_full_record() {
        let mock = transport();
        let analysis = analyzer(Arc::clone(&mock))
            .analyze("  rust async  ", Some("https://Example.com"), "us", "en")
            .await
            .unwrap();

        assert_eq!(analysis.keyword, "rust async");
        assert_eq!(analysis.target_url.as_deref(), Some("https://Example.com"));
        assert_eq!(analysis.target_position, Some(6));
        assert!(analysis.is_ranking);
        // 25 + 20 + 12 + 6
        assert_eq!(analysis.competition.competition_score, 63);
        assert_eq!(analysis.competition.difficulty, Difficulty::Medium);
        let kinds: Vec<_> = analysis.opportunities.iter().map(|o| o.opportunity_type).collect();
        assert_eq!(kinds, vec![OpportunityType::Position4To10, OpportunityType::KeywordExpansion]);
        assert_eq!(analysis.related_keywords, vec!["a", "b", "c", "d"]);
        assert_eq!(analysis.paa_questions.len(), 2);
        assert_eq!(analysis.serp_summary.organic_count, 10);
        assert_eq!(analysis.serp_summary.top_domains.len(), 5);
        assert_eq!(analysis.opportunity_count(), 2);

        let sent = mock.requests();
        assert_eq!(sent[0].json_body().unwrap()["num"], 100);
    }

    #[tokio::test(start_paused = true)]
    async fn unranked_without_target() {
        let analysis = analyzer(transport()).analyze("rust", None, "us", "en").await.unwrap();
        assert_eq!(analysis.target_position, None);
        assert!(!analysis.is_ranking);
        assert_eq!(analysis.opportunities[0].opportunity_type, OpportunityType::NotRanking);
    }

    #[tokio::test(start_paused = true)]
    async fn short_keyword_is_rejected_before_fetching() {
        let mock = transport();
        let err = analyzer(Arc::clone(&mock)).analyze("a", None, "us", "en").await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert_eq!(mock.request_count(), 0);

        // the list validator has no minimum length; the analyzer enforces it
        assert_eq!(validate_keywords("a").unwrap(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_weights_change_the_score() {
        let weights = ScoringWeights {
            knowledge_graph: 0,
            ..ScoringWeights::default()
        };
        let analysis = analyzer(transport())
            .with_weights(weights)
            .analyze("rust", None, "us", "en")
            .await
            .unwrap();
        // 25 + 12 + 6
        assert_eq!(analysis.competition.competition_score, 43);
        assert_eq!(analysis.competition.difficulty, Difficulty::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_sends_time_filter() {
        let mock = transport();
        let snap = analyzer(Arc::clone(&mock))
            .snapshot("rust", TimeFilter::Week, "us", "en")
            .await
            .unwrap();
        assert_eq!(snap.query, "rust");
        assert_eq!(snap.organic_count, 10);
        assert_eq!(snap.top_position, Some(1));
        assert_eq!(snap.top_domain.as_deref(), Some("site1.com"));
        assert_eq!(snap.related_searches_count, 4);
        assert!(snap.has_knowledge_graph);
        assert_eq!(mock.requests()[0].json_body().unwrap()["tbs"], "qdr:w");
    }

    #[tokio::test(start_paused = true)]
    async fn batch_keys_are_the_keywords_as_given() {
        let keywords = vec!["  padded keyword ".to_string()];
        let results = analyzer(transport())
            .batch_analyze(&keywords, None, "us", "en")
            .await;
        let keys: Vec<&str> = results.keys().collect();
        assert_eq!(keys, vec!["  padded keyword "]);
        assert_eq!(results.get("  padded keyword ").unwrap().keyword, "padded keyword");
    }

    #[tokio::test(start_paused = true)]
    async fn provider_without_full_serp_is_configuration_error() {
        let ddg = DuckDuckGoAdapter::new(&Config::default(), transport(), &RateLimiterRegistry::new());
        let analyzer = KeywordAnalyzer::new(
            Arc::new(Provider::DuckDuckGo(ddg)),
            RetryPolicy::for_collectors(1, Duration::from_secs(1)),
        );
        let err = analyzer.analyze("rust", None, "us", "en").await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_retries_transient_provider_errors() {
        let mock = Arc::new(MockTransport::new());
        mock.push_body(503, "unavailable").push_json(200, serp_body("rust"));
        let analysis = analyzer(Arc::clone(&mock)).analyze("rust", None, "us", "en").await;
        assert!(analysis.is_ok());
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_skips_failures_and_keeps_order() {
        let mock = transport();
        let keywords = vec![
            "first keyword".to_string(),
            "broken keyword".to_string(),
            "third keyword".to_string(),
        ];
        let results = analyzer(Arc::clone(&mock))
            .batch_analyze(&keywords, None, "us", "en")
            .await;

        assert_eq!(results.len(), 2);
        let keys: Vec<&str> = results.keys().collect();
        assert_eq!(keys, vec!["first keyword", "third keyword"]);
        assert!(results.get("broken keyword").is_none());
        // broken keyword exhausts its three attempts
        assert_eq!(mock.request_count(), 5);

        let json = serde_json::to_string(&results).unwrap();
        let first = json.find("first keyword").unwrap();
        let third = json.find("third keyword").unwrap();
        assert!(first < third);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_pauses_between_keywords() {
        let keywords = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let start = tokio::time::Instant::now();
        let results = analyzer(transport())
            .with_batch_delay(Duration::from_secs(2))
            .batch_analyze(&keywords, None, "us", "en")
            .await;
        assert_eq!(results.len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(4));
    }
}
