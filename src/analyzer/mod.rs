pub mod batch;
pub mod keyword;
pub mod target;
pub mod trend;

pub use batch::BatchAnalysis;
pub use keyword::KeywordAnalyzer;
pub use target::resolve_target_position;
pub use trend::{TrendAnalysis, TrendDirection, TrendSnapshot};
