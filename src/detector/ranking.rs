use crate::types::Opportunity;

/// Impact score used by `prioritize`: priority weight, impressions (capped at 50),
/// closeness to the top (20 - position, floored at 0) and confidence.
pub fn priority_score(o: &Opportunity) -> f64 {
    let mut score = o.priority.weight();
    if let Some(impressions) = o.current_impressions.filter(|&i| i > 0) {
        score += (impressions as f64 / 100.0).min(50.0);
    }
    if let Some(position) = o.current_position.filter(|&p| p > 0) {
        score += (20.0 - position as f64).max(0.0);
    }
    score + o.confidence * 20.0
}

/// Top `max_results` by `priority_score`, highest first. Ties keep input order.
pub fn prioritize(opportunities: &[Opportunity], max_results: usize) -> Vec<Opportunity> {
    let mut scored: Vec<(f64, &Opportunity)> = opportunities.iter().map(|o| (priority_score(o), o)).collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(max_results).map(|(_, o)| o.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OpportunityType, Priority};
    use chrono::Utc;

    fn opp(query: &str, priority: Priority, position: Option<u32>, impressions: Option<u64>, confidence: f64) -> Opportunity {
        Opportunity {
            query: query.to_string(),
            opportunity_type: OpportunityType::LowCtr,
            priority,
            current_position: position,
            current_ctr: None,
            current_clicks: None,
            current_impressions: impressions,
            estimated_impact: String::new(),
            recommendation: String::new(),
            confidence,
            competition_score: None,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn score_components() {
        // 100 + min(12000/100, 50) + (20 - 5) + 0.85 * 20
        let o = opp("a", Priority::High, Some(5), Some(12_000), 0.85);
        assert!((priority_score(&o) - 182.0).abs() < 1e-9);

        // 10 + 3 + 0 + 16
        let o = opp("b", Priority::Low, Some(25), Some(300), 0.8);
        assert!((priority_score(&o) - 29.0).abs() < 1e-9);
    }

    #[test]
    fn prioritize_orders_and_truncates() {
        let list = vec![
            opp("low", Priority::Low, None, None, 0.8),
            opp("medium", Priority::Medium, Some(8), Some(5000), 0.75),
            opp("high", Priority::High, Some(3), Some(100), 0.85),
            opp("high-deep", Priority::High, Some(40), None, 0.8),
        ];
        let top = prioritize(&list, 3);
        let names: Vec<&str> = top.iter().map(|o| o.query.as_str()).collect();
        // 135, 127, 116; "low" (26) is cut
        assert_eq!(names, vec!["high", "medium", "high-deep"]);
        assert!(prioritize(&list, 0).is_empty());
    }

    #[test]
    fn ties_keep_input_order() {
        let list = vec![
            opp("first", Priority::Medium, None, None, 0.5),
            opp("second", Priority::Medium, None, None, 0.5),
        ];
        let names: Vec<String> = prioritize(&list, 10).into_iter().map(|o| o.query).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
