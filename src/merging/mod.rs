pub mod auto_merge;
pub mod conflicts;
pub mod executor;

pub use auto_merge::AutoMergeOrchestrator;
pub use conflicts::ConflictAnalyzer;
pub use executor::MergeExecutor;
