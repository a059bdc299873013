use serde_json::{Map, Value};

use crate::fetcher::{domain_matches, target_domain};
use crate::types::extract_domain;

/// Rank of the target site in raw organic entries. Entries are scanned in ascending
/// position order (missing positions fall back to index + 1, ties keep provider order);
/// the first domain match wins.
pub fn resolve_target_position(organic: &[Map<String, Value>], target_url: &str) -> Option<u32> {
    let target = target_domain(target_url);
    if target.is_empty() {
        return None;
    }

    let mut ranked: Vec<(u32, &str)> = organic
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            let link = entry.get("link").and_then(Value::as_str)?;
            let position = entry
                .get("position")
                .and_then(Value::as_u64)
                .map(|p| p.min(u64::from(u32::MAX)) as u32)
                .unwrap_or(idx as u32 + 1);
            Some((position, link))
        })
        .collect();
    ranked.sort_by_key(|(position, _)| *position);

    ranked
        .into_iter()
        .find(|(_, link)| domain_matches(&extract_domain(link), &target))
        .map(|(position, _)| position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn organic(items: Value) -> Vec<Map<String, Value>> {
        items
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn www_and_case_are_ignored() {
        let items = organic(json!([
            {"position": 1, "link": "https://docs.rs/"},
            {"position": 2, "link": "https://www.example.com/page"}
        ]));
        assert_eq!(resolve_target_position(&items, "https://Example.com"), Some(2));
    }

    #[test]
    fn lowest_position_wins_regardless_of_order() {
        let items = organic(json!([
            {"position": 9, "link": "https://example.com/b"},
            {"position": 4, "link": "https://blog.example.com/a"}
        ]));
        assert_eq!(resolve_target_position(&items, "example.com"), Some(4));
    }

    #[test]
    fn missing_positions_use_index() {
        let items = organic(json!([
            {"link": "https://a.com"},
            {"link": "https://b.com"},
            {"link": "https://example.com"}
        ]));
        assert_eq!(resolve_target_position(&items, "https://example.com"), Some(3));
    }

    #[test]
    fn substring_is_not_a_match() {
        let items = organic(json!([{"position": 1, "link": "https://myexample.com"}]));
        assert_eq!(resolve_target_position(&items, "example.com"), None);
        assert_eq!(resolve_target_position(&items, ""), None);
    }
}
