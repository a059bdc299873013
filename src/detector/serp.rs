use chrono::Utc;
use tracing::debug;

use crate::config::confidence;
use crate::config::detection_thresholds::EXPANSION_MIN_RELATED;
use crate::detector::classifier::{classify_position, PositionClass};
use crate::detector::metrics::expected_ctr;
use crate::types::{CompetitionMetrics, FullSerpResponse, Opportunity, OpportunityType, Priority};

/// Opportunities from one live SERP: exactly one positional record, then an
/// optional quick win and an optional keyword-expansion record, in that order.
pub fn detect_from_serp(
    keyword: &str,
    target_position: Option<u32>,
    competition: &CompetitionMetrics,
    serp: &FullSerpResponse,
) -> Vec<Opportunity> {
    let class = classify_position(target_position);
    let (kind, priority) = class.opportunity();
    let mut out = vec![serp_opportunity(
        keyword,
        kind,
        priority,
        target_position,
        competition,
        positional_impact(class, target_position, competition),
        class.message(target_position),
    )];

    if competition.is_low_competition() {
        out.push(serp_opportunity(
            keyword,
            OpportunityType::QuickWin,
            Priority::High,
            target_position,
            competition,
            format!("Opportunity score {}/100", competition.opportunity_score),
            "Low competition - quick win potential".to_string(),
        ));
    }

    let related = serp.related_queries().len();
    if related > EXPANSION_MIN_RELATED {
        out.push(serp_opportunity(
            keyword,
            OpportunityType::KeywordExpansion,
            Priority::Medium,
            target_position,
            competition,
            format!("{related} additional keywords to target"),
            format!("{related} related keywords found"),
        ));
    }

    debug!(keyword, count = out.len(), ?target_position, "SERP opportunities");
    out
}

fn positional_impact(class: PositionClass, position: Option<u32>, competition: &CompetitionMetrics) -> String {
    let top3 = expected_ctr(3) * 100.0;
    match (class, position) {
        (PositionClass::NotRanking, _) | (_, None) => {
            format!("Opportunity score {}/100", competition.opportunity_score)
        }
        (PositionClass::Top3, Some(p)) => {
            format!("Expected CTR {:.0}% at position {}", expected_ctr(p.max(1)) * 100.0, p)
        }
        (_, Some(p)) => format!(
            "Expected CTR {:.0}% at position {p}, {top3:.0}% in top 3",
            expected_ctr(p) * 100.0
        ),
    }
}

fn serp_opportunity(
    keyword: &str,
    opportunity_type: OpportunityType,
    priority: Priority,
    position: Option<u32>,
    competition: &CompetitionMetrics,
    estimated_impact: String,
    recommendation: String,
) -> Opportunity {
    Opportunity {
        query: keyword.to_string(),
        opportunity_type,
        priority,
        current_position: position,
        current_ctr: None,
        current_clicks: None,
        current_impressions: None,
        estimated_impact,
        recommendation,
        confidence: confidence::SERP,
        competition_score: Some(competition.competition_score),
        detected_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{score, ScoringWeights};
    use crate::types::SerpSummary;
    use serde_json::json;

    fn serp(organic: usize, related: usize, kg: bool) -> FullSerpResponse {
        let organic: Vec<_> = (1..=organic)
            .map(|i| json!({"position": i, "link": format!("https://s{i}.com/")}))
            .collect();
        let related: Vec<_> = (0..related).map(|i| json!({"query": format!("r{i}")})).collect();
        let mut payload = json!({"organic": organic, "relatedSearches": related});
        if kg {
            payload["knowledgeGraph"] = json!({"title": "x"});
        }
        FullSerpResponse::from_payload("kw", payload).unwrap()
    }

    fn detect(position: Option<u32>, s: &FullSerpResponse) -> Vec<Opportunity> {
        let competition = score(s, &ScoringWeights::default());
        detect_from_serp("kw", position, &competition, s)
    }

    #[test]
    fn not_ranking_on_busy_serp() {
        // 25 + 20 + 12 = 57 -> Medium, no quick win; 4 related -> expansion
        let s = serp(10, 4, true);
        let opps = detect(None, &s);
        let kinds: Vec<_> = opps.iter().map(|o| o.opportunity_type).collect();
        assert_eq!(kinds, vec![OpportunityType::NotRanking, OpportunityType::KeywordExpansion]);
        assert_eq!(opps[0].priority, Priority::Medium);
        assert_eq!(opps[0].recommendation, "Not ranking - new content opportunity");
        assert_eq!(opps[1].recommendation, "4 related keywords found");
        assert!(opps.iter().all(|o| o.competition_score == Some(57)));
        assert!(opps.iter().all(|o| o.confidence == 0.80));
    }

    #[test]
    fn low_competition_adds_quick_win() {
        let s = serp(3, 3, false);
        let opps = detect(Some(2), &s);
        let kinds: Vec<_> = opps.iter().map(|o| o.opportunity_type).collect();
        assert_eq!(kinds, vec![OpportunityType::Maintain, OpportunityType::QuickWin]);
        assert_eq!(opps[0].priority, Priority::Low);
        assert_eq!(opps[1].priority, Priority::High);
        assert_eq!(opps[0].current_position, Some(2));
    }

    #[test]
    fn exactly_three_related_is_not_expansion() {
        let s = serp(10, 3, true);
        let opps = detect(Some(7), &s);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].opportunity_type, OpportunityType::Position4To10);
        assert_eq!(opps[0].priority, Priority::High);
        assert_eq!(opps[0].estimated_impact, "Expected CTR 4% at position 7, 11% in top 3");
    }

    #[test]
    fn blank_related_searches_do_not_count_towards_expansion() {
        let payload = json!({
            "organic": [{"position": 1, "link": "https://a.com/"}],
            "relatedSearches": [{"query": "a"}, {"query": " "}, {"query": "b"}, {}, {"query": "c"}]
        });
        let s = FullSerpResponse::from_payload("kw", payload).unwrap();
        let opps = detect(None, &s);
        assert!(opps.iter().all(|o| o.opportunity_type != OpportunityType::KeywordExpansion));
        assert_eq!(SerpSummary::from_response(&s).related_count, s.related_queries().len());
    }

    #[test]
    fn deep_positions() {
        let s = serp(10, 0, true);
        assert_eq!(detect(Some(15), &s)[0].priority, Priority::High);
        let deep = &detect(Some(35), &s)[0];
        assert_eq!(deep.opportunity_type, OpportunityType::PositionImprovement);
        assert_eq!(deep.priority, Priority::Medium);
    }
}
