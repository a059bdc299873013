use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Normalized SERP entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerpResult {
    /// 1-based rank, as reported by the provider or by batch order.
    pub position: u32,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub domain: String,
}

/// Host part of a URL (port kept), or empty when the URL is absent or unparsable.
pub fn extract_domain(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return String::new();
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// Lowercased domain with a leading `www.` removed. Used for all domain comparisons.
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

// ---------------------------------------------------------------------------
// Collector response (the `collect` contract shared by every provider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorMetadata {
    pub source: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub result_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorResponse {
    pub success: bool,
    pub data: Vec<SerpResult>,
    pub error: Option<String>,
    pub metadata: CollectorMetadata,
}

impl CollectorResponse {
    pub fn success_response(data: Vec<SerpResult>, source: &str, query: &str, duration_ms: u64) -> Self {
        let result_count = data.len();
        Self {
            success: true,
            data,
            error: None,
            metadata: CollectorMetadata {
                source: source.to_string(),
                query: query.to_string(),
                timestamp: Utc::now(),
                duration_ms: Some(duration_ms),
                result_count: Some(result_count),
            },
        }
    }

    pub fn error_response(error: impl Into<String>, source: &str, query: &str) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            error: Some(error.into()),
            metadata: CollectorMetadata {
                source: source.to_string(),
                query: query.to_string(),
                timestamp: Utc::now(),
                duration_ms: None,
                result_count: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Full SERP response
// ---------------------------------------------------------------------------

/// Everything one provider returned for one query. Organic entries are kept raw
/// so provider-specific keys (sitelinks, dates, ratings) survive normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullSerpResponse {
    pub query: String,
    pub fetched_at: DateTime<Utc>,
    pub search_parameters: Map<String, Value>,
    pub organic: Vec<Map<String, Value>>,
    pub knowledge_graph: Option<Map<String, Value>>,
    pub people_also_ask: Vec<Map<String, Value>>,
    pub related_searches: Vec<Map<String, Value>>,
    pub credits_used: u64,
}

impl FullSerpResponse {
    /// Builds a response from a Serper-shaped JSON payload. Non-object list items are dropped.
    pub fn from_payload(query: &str, payload: Value) -> Result<Self> {
        let Value::Object(mut root) = payload else {
            return Err(AppError::Analysis(format!(
                "SERP payload for '{query}' is not a JSON object"
            )));
        };

        let search_parameters = match root.remove("searchParameters") {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        let knowledge_graph = match root.remove("knowledgeGraph") {
            Some(Value::Object(m)) if !m.is_empty() => Some(m),
            _ => None,
        };
        let credits_used = root.get("credits").and_then(Value::as_u64).unwrap_or(1);

        Ok(Self {
            query: query.to_string(),
            fetched_at: Utc::now(),
            search_parameters,
            organic: take_objects(&mut root, "organic"),
            knowledge_graph,
            people_also_ask: take_objects(&mut root, "peopleAlsoAsk"),
            related_searches: take_objects(&mut root, "relatedSearches"),
            credits_used,
        })
    }

    /// Unique domains of the first 10 organic results, in rank order.
    pub fn top_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = Vec::new();
        for entry in self.organic.iter().take(10) {
            let Some(link) = entry.get("link").and_then(Value::as_str) else {
                continue;
            };
            let domain = extract_domain(link);
            if !domain.is_empty() && !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        domains
    }

    /// Position 0 is reserved for the featured snippet. Entries without a position count as 1.
    pub fn has_featured_snippet(&self) -> bool {
        self.organic
            .iter()
            .any(|e| e.get("position").and_then(Value::as_u64).unwrap_or(1) == 0)
    }

    pub fn has_sitelinks(&self) -> bool {
        self.organic.iter().any(|e| match e.get("sitelinks") {
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        })
    }

    pub fn has_knowledge_graph(&self) -> bool {
        self.knowledge_graph.is_some()
    }

    /// Non-empty related-search queries, in provider order.
    pub fn related_queries(&self) -> Vec<String> {
        collect_field(&self.related_searches, "query")
    }

    /// Non-empty People-Also-Ask questions, in provider order.
    pub fn paa_questions(&self) -> Vec<String> {
        collect_field(&self.people_also_ask, "question")
    }
}

fn take_objects(root: &mut Map<String, Value>, key: &str) -> Vec<Map<String, Value>> {
    match root.remove(key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(m) => Some(m),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn collect_field(items: &[Map<String, Value>], key: &str) -> Vec<String> {
    items
        .iter()
        .filter_map(|m| m.get(key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Competition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Low,
    Medium,
    High,
}

impl Difficulty {
    pub fn from_score(score: u8) -> Self {
        use crate::config::difficulty_thresholds::*;
        if score >= HIGH_MIN {
            Difficulty::High
        } else if score >= MEDIUM_MIN {
            Difficulty::Medium
        } else {
            Difficulty::Low
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Low => "Low",
            Difficulty::Medium => "Medium",
            Difficulty::High => "High",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionMetrics {
    pub query: String,
    pub competition_score: u8,
    pub difficulty: Difficulty,
    /// Always `100 - competition_score`.
    pub opportunity_score: u8,
    pub total_serp_results: usize,
    pub has_knowledge_graph: bool,
    pub has_featured_snippet: bool,
    pub has_sitelinks: bool,
    pub top_domains: Vec<String>,
    pub related_searches_count: usize,
    pub paa_count: usize,
}

impl CompetitionMetrics {
    pub fn is_low_competition(&self) -> bool {
        self.difficulty == Difficulty::Low
    }

    pub fn is_quick_win(&self) -> bool {
        self.competition_score < 40 && self.opportunity_score > 60
    }
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Weight used by `prioritize`.
    pub fn weight(self) -> f64 {
        match self {
            Priority::High => 100.0,
            Priority::Medium => 50.0,
            Priority::Low => 10.0,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    NotRanking,
    PositionImprovement,
    LowCtr,
    #[serde(rename = "position_4_10")]
    Position4To10,
    QuickWin,
    TrendingUp,
    HighImpressions,
    NewKeyword,
    KeywordExpansion,
    Maintain,
}

impl std::fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OpportunityType::NotRanking => "not_ranking",
            OpportunityType::PositionImprovement => "position_improvement",
            OpportunityType::LowCtr => "low_ctr",
            OpportunityType::Position4To10 => "position_4_10",
            OpportunityType::QuickWin => "quick_win",
            OpportunityType::TrendingUp => "trending_up",
            OpportunityType::HighImpressions => "high_impressions",
            OpportunityType::NewKeyword => "new_keyword",
            OpportunityType::KeywordExpansion => "keyword_expansion",
            OpportunityType::Maintain => "maintain",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub query: String,
    pub opportunity_type: OpportunityType,
    pub priority: Priority,
    pub current_position: Option<u32>,
    pub current_ctr: Option<f64>,
    pub current_clicks: Option<u64>,
    pub current_impressions: Option<u64>,
    pub estimated_impact: String,
    pub recommendation: String,
    /// 0..=1, fixed per opportunity type.
    pub confidence: f64,
    /// Set by the live SERP path only.
    pub competition_score: Option<u8>,
    pub detected_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn ctr_percentage(&self) -> Option<f64> {
        self.current_ctr.map(|ctr| (ctr * 10_000.0).round() / 100.0)
    }
}

// ---------------------------------------------------------------------------
// Keyword analysis (aggregate root)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerpSummary {
    pub organic_count: usize,
    pub has_knowledge_graph: bool,
    pub paa_count: usize,
    pub related_count: usize,
    /// First five of the response's top domains.
    pub top_domains: Vec<String>,
    pub has_featured_snippet: bool,
    pub has_sitelinks: bool,
}

impl SerpSummary {
    pub fn from_response(serp: &FullSerpResponse) -> Self {
        Self {
            organic_count: serp.organic.len(),
            has_knowledge_graph: serp.has_knowledge_graph(),
            paa_count: serp.paa_questions().len(),
            related_count: serp.related_queries().len(),
            top_domains: serp.top_domains().into_iter().take(5).collect(),
            has_featured_snippet: serp.has_featured_snippet(),
            has_sitelinks: serp.has_sitelinks(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordAnalysis {
    pub keyword: String,
    pub target_url: Option<String>,
    pub target_position: Option<u32>,
    pub is_ranking: bool,
    pub competition: CompetitionMetrics,
    pub opportunities: Vec<Opportunity>,
    pub related_keywords: Vec<String>,
    pub paa_questions: Vec<String>,
    pub serp_summary: SerpSummary,
    pub analyzed_at: DateTime<Utc>,
}

impl KeywordAnalysis {
    pub fn opportunity_count(&self) -> usize {
        self.opportunities.len()
    }

    pub fn has_opportunities(&self) -> bool {
        !self.opportunities.is_empty()
    }

    pub fn related_keyword_count(&self) -> usize {
        self.related_keywords.len()
    }
}

// ---------------------------------------------------------------------------
// Performance data (GSC-like provider)
// ---------------------------------------------------------------------------

/// One (query, page) row of performance data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GscMetric {
    pub query: String,
    pub page: Option<String>,
    pub clicks: u64,
    pub impressions: u64,
    /// 0..=1
    pub ctr: f64,
    /// Average position, >= 0.
    pub position: f64,
    pub metric_date: Option<NaiveDate>,
    pub country: Option<String>,
    pub device: Option<String>,
}

impl GscMetric {
    pub fn ctr_percentage(&self) -> f64 {
        (self.ctr * 10_000.0).round() / 100.0
    }

    pub fn is_first_page(&self) -> bool {
        self.position <= crate::config::detection_thresholds::FIRST_PAGE_MAX_POSITION
    }
}

/// Aggregate over one site's performance rows for a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GscSummary {
    pub site_url: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub metrics: Vec<GscMetric>,
    pub total_queries: usize,
    pub total_clicks: u64,
    pub total_impressions: u64,
    pub average_ctr: f64,
    pub average_position: f64,
}

impl GscSummary {
    pub fn from_metrics(
        site_url: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        metrics: Vec<GscMetric>,
    ) -> Result<Self> {
        if metrics.is_empty() {
            return Err(AppError::InsufficientData(format!(
                "no performance rows for {site_url} between {start_date} and {end_date}"
            )));
        }

        let total_clicks: u64 = metrics.iter().map(|m| m.clicks).sum();
        let total_impressions: u64 = metrics.iter().map(|m| m.impressions).sum();
        let average_ctr = if total_impressions > 0 {
            total_clicks as f64 / total_impressions as f64
        } else {
            0.0
        };
        let average_position = metrics.iter().map(|m| m.position).sum::<f64>() / metrics.len() as f64;

        Ok(Self {
            site_url: site_url.to_string(),
            start_date,
            end_date,
            total_queries: metrics.len(),
            metrics,
            total_clicks,
            total_impressions,
            average_ctr,
            average_position,
        })
    }

    pub fn days_in_range(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn average_ctr_percentage(&self) -> f64 {
        (self.average_ctr * 10_000.0).round() / 100.0
    }
}
