use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::detection_thresholds::TREND_MIN_GROWTH_PCT;
use crate::error::{AppError, Result};
use crate::fetcher::serper::TimeFilter;
use crate::types::{extract_domain, FullSerpResponse};

/// SERP shape of one keyword under one recency filter, at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub timestamp: DateTime<Utc>,
    pub time_range: TimeFilter,
    pub query: String,
    pub organic_count: usize,
    pub top_position: Option<u32>,
    pub top_url: Option<String>,
    pub top_domain: Option<String>,
    pub related_searches_count: usize,
    pub paa_count: usize,
    pub has_knowledge_graph: bool,
    pub has_featured_snippet: bool,
}

impl TrendSnapshot {
    pub fn from_response(serp: &FullSerpResponse, time_range: TimeFilter) -> Self {
        let top = serp
            .organic
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let position = entry
                    .get("position")
                    .and_then(Value::as_u64)
                    .map_or(i as u32 + 1, |p| p.min(100) as u32);
                (position, entry)
            })
            .min_by_key(|(position, _)| *position);
        let top_url = top
            .and_then(|(_, entry)| entry.get("link").and_then(Value::as_str))
            .filter(|link| !link.is_empty())
            .map(str::to_string);

        Self {
            timestamp: serp.fetched_at,
            time_range,
            query: serp.query.clone(),
            organic_count: serp.organic.len(),
            top_position: top.map(|(position, _)| position),
            top_domain: top_url.as_deref().map(extract_domain).filter(|d| !d.is_empty()),
            top_url,
            related_searches_count: serp.related_searches.len(),
            paa_count: serp.people_also_ask.len(),
            has_knowledge_graph: serp.has_knowledge_graph(),
            has_featured_snippet: serp.has_featured_snippet(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Change in organic result volume between the oldest and newest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub query: String,
    pub period_days: i64,
    pub snapshots: Vec<TrendSnapshot>,
    pub growth_percentage: f64,
    pub direction: TrendDirection,
    pub analyzed_at: DateTime<Utc>,
}

impl TrendAnalysis {
    /// Needs at least two snapshots. They are ordered by timestamp first.
    pub fn from_snapshots(query: &str, mut snapshots: Vec<TrendSnapshot>) -> Result<Self> {
        if snapshots.len() < 2 {
            return Err(AppError::InsufficientData(format!(
                "trend for '{query}' needs at least 2 snapshots, got {}",
                snapshots.len()
            )));
        }
        snapshots.sort_by_key(|s| s.timestamp);

        let (first, last) = match (snapshots.first(), snapshots.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(AppError::InsufficientData(format!("no snapshots for '{query}'"))),
        };
        let growth_percentage = growth(first.organic_count, last.organic_count);
        let period_days = (last.timestamp - first.timestamp).num_days().max(1);

        let direction = if growth_percentage >= TREND_MIN_GROWTH_PCT {
            TrendDirection::Up
        } else if growth_percentage <= -TREND_MIN_GROWTH_PCT {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        };

        Ok(Self {
            query: query.to_string(),
            period_days,
            growth_percentage,
            direction,
            snapshots,
            analyzed_at: Utc::now(),
        })
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_trending_up(&self) -> bool {
        self.direction == TrendDirection::Up
    }
}

fn growth(from: usize, to: usize) -> f64 {
    if from == 0 {
        return if to > 0 { 100.0 } else { 0.0 };
    }
    (to as f64 - from as f64) / from as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn serp(organic: usize, fetched_at: DateTime<Utc>) -> FullSerpResponse {
        let items: Vec<Value> = (1..=organic)
            .map(|i| json!({"position": i + 1, "link": format!("https://www.site{i}.com/")}))
            .collect();
        let mut resp = FullSerpResponse::from_payload("rust", json!({"organic": items, "peopleAlsoAsk": [{"question": "q"}]}))
            .unwrap();
        resp.fetched_at = fetched_at;
        resp
    }

    #[test]
    fn snapshot_picks_best_ranked_entry() {
        let now = Utc::now();
        let snap = TrendSnapshot::from_response(&serp(3, now), TimeFilter::Week);
        assert_eq!(snap.organic_count, 3);
        assert_eq!(snap.top_position, Some(2));
        assert_eq!(snap.top_url.as_deref(), Some("https://www.site1.com/"));
        assert_eq!(snap.top_domain.as_deref(), Some("www.site1.com"));
        assert_eq!(snap.paa_count, 1);
        assert_eq!(snap.time_range, TimeFilter::Week);
        assert_eq!(snap.timestamp, now);
    }

    #[test]
    fn empty_serp_has_no_top_result() {
        let snap = TrendSnapshot::from_response(&serp(0, Utc::now()), TimeFilter::Day);
        assert_eq!(snap.top_position, None);
        assert_eq!(snap.top_url, None);
    }

    #[test]
    fn growth_is_measured_oldest_to_newest() {
        let now = Utc::now();
        let newer = TrendSnapshot::from_response(&serp(8, now), TimeFilter::Week);
        let older = TrendSnapshot::from_response(&serp(5, now - Duration::days(7)), TimeFilter::Week);

        let trend = TrendAnalysis::from_snapshots("rust", vec![newer, older]).unwrap();
        assert_eq!(trend.period_days, 7);
        assert_eq!(trend.growth_percentage, 60.0);
        assert_eq!(trend.direction, TrendDirection::Up);
        assert!(trend.is_trending_up());
        assert_eq!(trend.snapshots[0].organic_count, 5);
        assert_eq!(trend.snapshot_count(), 2);
    }

    #[test]
    fn small_changes_are_stable_and_drops_are_down() {
        let now = Utc::now();
        let snap = |n, days| TrendSnapshot::from_response(&serp(n, now - Duration::days(days)), TimeFilter::Day);

        let stable = TrendAnalysis::from_snapshots("rust", vec![snap(10, 2), snap(10, 0)]).unwrap();
        assert_eq!(stable.direction, TrendDirection::Stable);
        assert_eq!(stable.growth_percentage, 0.0);

        let down = TrendAnalysis::from_snapshots("rust", vec![snap(10, 2), snap(4, 0)]).unwrap();
        assert_eq!(down.direction, TrendDirection::Down);
        assert_eq!(down.growth_percentage, -60.0);
    }

    #[test]
    fn single_snapshot_is_insufficient() {
        let snap = TrendSnapshot::from_response(&serp(3, Utc::now()), TimeFilter::Month);
        let err = TrendAnalysis::from_snapshots("rust", vec![snap]).unwrap_err();
        assert!(matches!(err, AppError::InsufficientData(_)));
    }
}
