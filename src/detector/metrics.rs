use std::cmp::Reverse;

use chrono::Utc;
use tracing::info;

use crate::config::confidence;
use crate::config::detection_thresholds::*;
use crate::detector::classifier::ctr_recommendation;
use crate::types::{GscMetric, Opportunity, OpportunityType, Priority};

/// Typical organic CTR by integer position; anything past 10 gets 1%.
pub fn expected_ctr(position: u32) -> f64 {
    match position {
        1 => 0.28,
        2 => 0.15,
        3 => 0.11,
        4 => 0.08,
        5 => 0.06,
        6 => 0.05,
        7 => 0.04,
        8 => 0.03,
        9 => 0.03,
        10 => 0.02,
        _ => 0.01,
    }
}

pub fn is_low_ctr(m: &GscMetric) -> bool {
    m.ctr < LOW_CTR_MAX && m.position <= FIRST_PAGE_MAX_POSITION && m.impressions >= LOW_CTR_MIN_IMPRESSIONS
}

pub fn is_position_4_10(m: &GscMetric) -> bool {
    (STRIKING_DISTANCE_MIN..=STRIKING_DISTANCE_MAX).contains(&m.position)
}

pub fn is_high_impressions_low_clicks(m: &GscMetric) -> bool {
    m.impressions >= HIGH_IMPRESSIONS_MIN && (m.clicks as f64) < m.impressions as f64 * HIGH_IMPRESSIONS_CLICK_RATIO
}

fn ctr_impact(m: &GscMetric) -> String {
    let potential = (m.impressions as f64 * expected_ctr(whole_position(m))).floor() as i64;
    let additional = potential - m.clicks as i64;
    if additional > 0 {
        format!("+{additional} clicks/month")
    } else {
        "Maintain current performance".to_string()
    }
}

fn top3_impact(m: &GscMetric) -> String {
    let additional = (m.impressions as f64 * (TOP3_TARGET_CTR - m.ctr)).trunc() as i64;
    if additional > 0 {
        format!("+{additional} clicks if top 3")
    } else {
        "Already performing well".to_string()
    }
}

fn whole_position(m: &GscMetric) -> u32 {
    m.position.trunc().max(0.0) as u32
}

fn from_metric(
    m: &GscMetric,
    opportunity_type: OpportunityType,
    priority: Priority,
    estimated_impact: String,
    recommendation: &str,
    confidence: f64,
) -> Opportunity {
    Opportunity {
        query: m.query.clone(),
        opportunity_type,
        priority,
        current_position: Some(whole_position(m)),
        current_ctr: Some(m.ctr),
        current_clicks: Some(m.clicks),
        current_impressions: Some(m.impressions),
        estimated_impact,
        recommendation: recommendation.to_string(),
        confidence,
        competition_score: None,
        detected_at: Utc::now(),
    }
}

/// Runs the three performance predicates over every row. A row may produce
/// several opportunities. Output: High first, then impressions descending.
pub fn detect_from_metrics(metrics: &[GscMetric]) -> Vec<Opportunity> {
    info!(count = metrics.len(), "detecting opportunities from performance metrics");

    let mut out = Vec::new();
    for m in metrics {
        if is_low_ctr(m) {
            out.push(from_metric(
                m,
                OpportunityType::LowCtr,
                Priority::High,
                ctr_impact(m),
                ctr_recommendation(whole_position(m)),
                confidence::LOW_CTR,
            ));
        }
        if is_position_4_10(m) {
            out.push(from_metric(
                m,
                OpportunityType::Position4To10,
                Priority::High,
                top3_impact(m),
                "Optimize content and meta tags to reach top 3",
                confidence::POSITION_4_10,
            ));
        }
        if is_high_impressions_low_clicks(m) {
            let potential = (m.impressions as f64 * HIGH_IMPRESSIONS_UPLIFT).trunc() as u64;
            out.push(from_metric(
                m,
                OpportunityType::HighImpressions,
                Priority::Medium,
                format!("+{potential} clicks potential"),
                "Improve title and meta description for better CTR",
                confidence::HIGH_IMPRESSIONS,
            ));
        }
    }

    out.sort_by_key(|o| (o.priority != Priority::High, Reverse(o.current_impressions.unwrap_or(0))));
    info!(count = out.len(), "opportunities detected");
    out
}
