use tracing::debug;

use crate::types::{CompetitionMetrics, Difficulty, FullSerpResponse};

/// Point table for the competition score. Each factor adds at most its cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringWeights {
    pub organic_full: u32,
    pub organic_full_min: usize,
    pub organic_partial: u32,
    pub organic_partial_min: usize,
    pub organic_sparse: u32,
    pub knowledge_graph: u32,
    pub related_per_item: u32,
    pub related_cap: u32,
    pub paa_per_item: u32,
    pub paa_cap: u32,
    pub sitelinks: u32,
    pub featured_snippet: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            organic_full: 25,
            organic_full_min: 10,
            organic_partial: 15,
            organic_partial_min: 5,
            organic_sparse: 5,
            knowledge_graph: 20,
            related_per_item: 3,
            related_cap: 15,
            paa_per_item: 3,
            paa_cap: 15,
            sitelinks: 15,
            featured_snippet: 10,
        }
    }
}

/// Competition score (0..=100) and difficulty for one SERP. Pure.
pub fn score(serp: &FullSerpResponse, weights: &ScoringWeights) -> CompetitionMetrics {
    let organic_count = serp.organic.len();
    let related_count = serp.related_searches.len();
    let paa_count = serp.people_also_ask.len();
    let has_knowledge_graph = serp.has_knowledge_graph();
    let has_sitelinks = serp.has_sitelinks();
    let has_featured_snippet = serp.has_featured_snippet();

    let organic_points = if organic_count >= weights.organic_full_min {
        weights.organic_full
    } else if organic_count >= weights.organic_partial_min {
        weights.organic_partial
    } else {
        weights.organic_sparse
    };

    let mut total = organic_points;
    if has_knowledge_graph {
        total += weights.knowledge_graph;
    }
    total += capped(related_count, weights.related_per_item, weights.related_cap);
    total += capped(paa_count, weights.paa_per_item, weights.paa_cap);
    if has_sitelinks {
        total += weights.sitelinks;
    }
    if has_featured_snippet {
        total += weights.featured_snippet;
    }

    let competition_score = total.min(100) as u8;
    let difficulty = Difficulty::from_score(competition_score);
    debug!(query = serp.query.as_str(), competition_score, %difficulty, "scored SERP");

    CompetitionMetrics {
        query: serp.query.clone(),
        competition_score,
        difficulty,
        opportunity_score: 100 - competition_score,
        total_serp_results: organic_count,
        has_knowledge_graph,
        has_featured_snippet,
        has_sitelinks,
        top_domains: serp.top_domains(),
        related_searches_count: related_count,
        paa_count,
    }
}

fn capped(count: usize, per_item: u32, cap: u32) -> u32 {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    count.saturating_mul(per_item).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn serp(organic: usize, kg: bool, related: usize, paa: usize, sitelinks: bool, snippet: bool) -> FullSerpResponse {
        let mut items: Vec<Value> = (1..=organic)
            .map(|i| json!({"position": i, "link": format!("https://site{i}.com/")}))
            .collect();
        if sitelinks {
            if let Some(first) = items.first_mut() {
                first["sitelinks"] = json!([{"title": "Docs"}]);
            }
        }
        if snippet {
            items.insert(0, json!({"position": 0, "link": "https://snippet.com/"}));
        }
        let mut payload = json!({
            "organic": items,
            "relatedSearches": (0..related).map(|i| json!({"query": format!("r{i}")})).collect::<Vec<_>>(),
            "peopleAlsoAsk": (0..paa).map(|i| json!({"question": format!("q{i}?")})).collect::<Vec<_>>(),
        });
        if kg {
            payload["knowledgeGraph"] = json!({"title": "Thing"});
        }
        FullSerpResponse::from_payload("test query", payload).unwrap()
    }

    #[test]
    fn all_features_saturate_at_100() {
        let m = score(&serp(10, true, 8, 8, true, true), &ScoringWeights::default());
        assert_eq!(m.competition_score, 100);
        assert_eq!(m.difficulty, Difficulty::High);
        assert_eq!(m.opportunity_score, 0);
        assert!(!m.is_quick_win());
    }

    #[test]
    fn sparse_serp_is_low_competition() {
        let m = score(&serp(3, false, 1, 0, false, false), &ScoringWeights::default());
        // 5 organic + 3 related
        assert_eq!(m.competition_score, 8);
        assert_eq!(m.difficulty, Difficulty::Low);
        assert_eq!(m.opportunity_score, 92);
        assert!(m.is_low_competition());
        assert!(m.is_quick_win());
    }

    #[test]
    fn factor_caps_apply() {
        let m = score(&serp(6, false, 20, 2, false, false), &ScoringWeights::default());
        // 15 organic + 15 related (capped) + 6 paa
        assert_eq!(m.competition_score, 36);
        assert_eq!(m.related_searches_count, 20);
        assert_eq!(m.paa_count, 2);
    }

    #[test]
    fn scores_sum_to_100_across_inputs() {
        let weights = ScoringWeights::default();
        for organic in [0, 4, 5, 9, 10, 30] {
            for related in [0, 2, 5, 9] {
                for kg in [false, true] {
                    let m = score(&serp(organic, kg, related, related, kg, false), &weights);
                    assert!(m.competition_score <= 100);
                    assert_eq!(u32::from(m.competition_score) + u32::from(m.opportunity_score), 100);
                    assert_eq!(m.difficulty, Difficulty::from_score(m.competition_score));
                }
            }
        }
    }

    #[test]
    fn scoring_is_idempotent() {
        let input = serp(10, true, 4, 2, false, true);
        let weights = ScoringWeights::default();
        assert_eq!(score(&input, &weights), score(&input, &weights));
    }

    #[test]
    fn custom_weights_are_honoured() {
        let weights = ScoringWeights {
            knowledge_graph: 60,
            ..ScoringWeights::default()
        };
        let m = score(&serp(10, true, 0, 0, false, false), &weights);
        assert_eq!(m.competition_score, 85);
        assert_eq!(m.difficulty, Difficulty::High);
    }
}
