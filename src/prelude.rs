//! Prelude module for convenient imports
//!
//! Import everything you need with: `use showdown::prelude::*;`

// Domain types
pub use crate::domain::{
    Amount, Batch, BatchAccumulator, CardRecord, DomainError, Entity, LoadStats, QueryRotation,
    QueryShape, Record, RowDialect, TransactionAnalytics, TransactionRecord, UserRecord,
};

// Storage types
pub use crate::storage::{
    Acknowledged, BulkSink, DualSinkWriter, ElasticsearchSink, InMemorySink, MongoSink,
    QueryTarget, SinkError, WriteError,
};

// Engine types
pub use crate::engine::{
    BenchmarkHarness, BenchmarkReport, DatabaseStats, EngineError, IngestionPipeline,
    LoadFailure, LoadOptions, LoadState, LoadSummary,
};

// IO types
pub use crate::io::{CsvRecordStream, DataFiles, IoError, write_json, write_json_line};

// Streaming types
pub use crate::streaming::{
    AbortOnError, BatchStream, BroadcastNotifier, ErrorPolicy, LogNotifier, Notification,
    Notifications, Notifier, ProgressReporter, SilentSkip, SkipRows,
};

// App types
pub use crate::app::{
    AppError, BenchArgs, Cli, CliApp, Command, Config, LoadArgs, RowErrorMode, StatsArgs,
    StatsSource, redact_url,
};
