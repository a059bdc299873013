pub mod classifier;
pub mod metrics;
pub mod ranking;
pub mod serp;
pub mod trend;

pub use metrics::{detect_from_metrics, expected_ctr};
pub use ranking::prioritize;
pub use serp::detect_from_serp;
pub use trend::detect_trend;
