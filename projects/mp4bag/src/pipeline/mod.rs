// Timestamp reconstruction and ordered merge of camera recordings

pub mod merge;
pub mod types;

pub use merge::MergePipeline;
pub use types::{MergeConfig, RegressionPolicy};
