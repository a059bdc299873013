use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::types::KeywordAnalysis;

/// Keyword → analysis, in the order the keywords were analyzed.
/// Serializes as a JSON object with that key order.
#[derive(Debug, Clone, Default)]
pub struct BatchAnalysis {
    entries: Vec<(String, KeywordAnalysis)>,
}

impl BatchAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-inserting a keyword replaces its analysis and keeps its first slot.
    pub fn insert(&mut self, keyword: String, analysis: KeywordAnalysis) {
        match self.entries.iter_mut().find(|(k, _)| *k == keyword) {
            Some(slot) => slot.1 = analysis,
            None => self.entries.push((keyword, analysis)),
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&KeywordAnalysis> {
        self.entries.iter().find(|(k, _)| k == keyword).map(|(_, a)| a)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeywordAnalysis)> {
        self.entries.iter().map(|(k, a)| (k.as_str(), a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for BatchAnalysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (keyword, analysis) in &self.entries {
            map.serialize_entry(keyword, analysis)?;
        }
        map.end()
    }
}
