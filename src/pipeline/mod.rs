pub mod aggregator;
pub mod analysis;

pub use aggregator::{ClassificationAggregator, Confidence, SkyCondition, Verdict};
