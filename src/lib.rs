//! SERP aggregation and keyword opportunity scoring.
//!
//! Provider adapters normalize search-engine and performance data, the scorer turns a
//! full SERP into a competition score, and the detector derives prioritized
//! opportunities. `analyzer::KeywordAnalyzer` ties them together.

pub mod analyzer;
pub mod config;
pub mod detector;
pub mod error;
pub mod fetcher;
pub mod latency;
pub mod limiter;
pub mod retry;
pub mod scorer;
pub mod types;
pub mod validators;
