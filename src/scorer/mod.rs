pub mod competition;

pub use competition::{score, ScoringWeights};
