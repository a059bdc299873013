use crate::types::{OpportunityType, Priority};

/// Where a tracked site sits in a live SERP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionClass {
    NotRanking,
    /// 1..=3
    Top3,
    /// 4..=10
    FirstPage,
    /// 11..=20
    NearFirstPage,
    /// > 20
    Deep,
}

/// Classify a resolved target position. `None` means the site was not found.
/// Position 0 (featured snippet slot) counts as top 3.
pub fn classify_position(position: Option<u32>) -> PositionClass {
    match position {
        None => PositionClass::NotRanking,
        Some(p) if p <= 3 => PositionClass::Top3,
        Some(p) if p <= 10 => PositionClass::FirstPage,
        Some(p) if p <= 20 => PositionClass::NearFirstPage,
        Some(_) => PositionClass::Deep,
    }
}

impl PositionClass {
    /// The single positional opportunity emitted for this class.
    pub fn opportunity(self) -> (OpportunityType, Priority) {
        match self {
            PositionClass::NotRanking => (OpportunityType::NotRanking, Priority::Medium),
            PositionClass::Top3 => (OpportunityType::Maintain, Priority::Low),
            PositionClass::FirstPage => (OpportunityType::Position4To10, Priority::High),
            PositionClass::NearFirstPage => (OpportunityType::PositionImprovement, Priority::High),
            PositionClass::Deep => (OpportunityType::PositionImprovement, Priority::Medium),
        }
    }

    pub fn message(self, position: Option<u32>) -> String {
        let p = position.unwrap_or_default();
        match self {
            PositionClass::NotRanking => "Not ranking - new content opportunity".to_string(),
            PositionClass::Top3 => "Strong position - monitor and maintain".to_string(),
            PositionClass::FirstPage => format!("Position {p} - push to top 3"),
            PositionClass::NearFirstPage | PositionClass::Deep => {
                format!("Ranking at position {p} - optimization needed")
            }
        }
    }
}

/// CTR advice for a performance row, keyed on the integer part of its average position.
pub fn ctr_recommendation(position: u32) -> &'static str {
    if position <= 3 {
        "Add rich snippets and improve meta description"
    } else if position <= 5 {
        "Optimize title tag with power words and numbers"
    } else if position <= 10 {
        "Improve content depth and add FAQ section"
    } else {
        "Focus on building topical authority"
    }
}
