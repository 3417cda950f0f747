pub mod cli;
pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use cli::CliApp;
pub use config::{
    BenchArgs, Cli, Command, Config, LoadArgs, RowErrorMode, StatsArgs, StatsSource, redact_url,
};
pub use error::AppError;
