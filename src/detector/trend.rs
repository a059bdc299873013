use chrono::Utc;
use tracing::debug;

use crate::analyzer::trend::TrendAnalysis;
use crate::config::confidence;
use crate::config::detection_thresholds::TREND_HIGH_GROWTH_PCT;
use crate::types::{Opportunity, OpportunityType, Priority};

/// A `trending_up` record when the keyword's SERP is growing, otherwise nothing.
pub fn detect_trend(trend: &TrendAnalysis) -> Option<Opportunity> {
    if !trend.is_trending_up() {
        return None;
    }
    let priority = if trend.growth_percentage >= TREND_HIGH_GROWTH_PCT {
        Priority::High
    } else {
        Priority::Medium
    };
    debug!(query = trend.query.as_str(), growth = trend.growth_percentage, %priority, "trending keyword");

    Some(Opportunity {
        query: trend.query.clone(),
        opportunity_type: OpportunityType::TrendingUp,
        priority,
        current_position: None,
        current_ctr: None,
        current_clicks: None,
        current_impressions: None,
        estimated_impact: format!(
            "+{:.0}% SERP activity over {} days",
            trend.growth_percentage, trend.period_days
        ),
        recommendation: "Rising interest - publish or refresh content now".to_string(),
        confidence: confidence::TRENDING,
        competition_score: None,
        detected_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::trend::{TrendDirection, TrendSnapshot};

    fn trend(growth_percentage: f64, direction: TrendDirection) -> TrendAnalysis {
        TrendAnalysis {
            query: "rust".to_string(),
            period_days: 7,
            snapshots: Vec::<TrendSnapshot>::new(),
            growth_percentage,
            direction,
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn rising_keyword_is_an_opportunity() {
        let opp = detect_trend(&trend(25.0, TrendDirection::Up)).unwrap();
        assert_eq!(opp.opportunity_type, OpportunityType::TrendingUp);
        assert_eq!(opp.priority, Priority::Medium);
        assert_eq!(opp.estimated_impact, "+25% SERP activity over 7 days");
        assert_eq!(opp.confidence, confidence::TRENDING);

        let fast = detect_trend(&trend(80.0, TrendDirection::Up)).unwrap();
        assert_eq!(fast.priority, Priority::High);
    }

    #[test]
    fn flat_or_falling_keywords_are_skipped() {
        assert!(detect_trend(&trend(0.0, TrendDirection::Stable)).is_none());
        assert!(detect_trend(&trend(-40.0, TrendDirection::Down)).is_none());
    }
}
