pub mod benchmark;
pub mod error;
pub mod pipeline;
pub mod stats;

// Re-export commonly used types
pub use benchmark::{BenchmarkHarness, BenchmarkReport, DatabaseReport, TestInfo};
pub use error::{EngineError, LoadFailure};
pub use pipeline::{IngestionPipeline, LoadOptions, LoadState, LoadSummary};
pub use stats::{Comparison, DatabaseStats, LatencyBreakdown, OperationResult, percentile};
