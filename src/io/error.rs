use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{DomainError, Entity};

/// IO-level errors for input discovery, CSV parsing and output writing
#[derive(Error, Debug)]
pub enum IoError {
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV async parsing error: {0}")]
    CsvAsync(#[from] csv_async::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Data directory not found: {}", .0.display())]
    DataDirNotFound(PathBuf),

    #[error("No CSV files found in {}", .0.display())]
    NoCsvFiles(PathBuf),

    #[error("No CSV file for {0}")]
    MissingEntityFile(Entity),

    #[error("{} has no `{column}` column", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl IoError {
    /// Errors confined to a single row; the stream can continue past them
    pub fn is_row_level(&self) -> bool {
        match self {
            Self::MissingField(_) | Self::Domain(_) => true,
            Self::CsvAsync(e) => !e.is_io_error(),
            _ => false,
        }
    }

    /// Errors raised before any destination is touched
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            Self::DataDirNotFound(_)
                | Self::NoCsvFiles(_)
                | Self::MissingEntityFile(_)
                | Self::MissingColumn { .. }
        )
    }
}
