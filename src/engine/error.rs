use thiserror::Error;

use super::pipeline::LoadState;
use crate::domain::{DomainError, LoadStats};
use crate::io::IoError;
use crate::storage::WriteError;

/// Engine-level errors for loading
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Missing input: {0}")]
    MissingInput(#[source] IoError),

    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Destination error: {0}")]
    Write(#[from] WriteError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Classify an error raised while locating input files
    pub fn from_discovery(error: IoError) -> Self {
        if error.is_missing_input() {
            Self::MissingInput(error)
        } else {
            Self::Io(error)
        }
    }
}

/// A load that stopped early
///
/// Carries the state the pipeline was in when the error happened and the
/// counts written up to that point.
#[derive(Error, Debug)]
#[error("Load failed while {state}: {error}")]
pub struct LoadFailure {
    pub state: LoadState,
    #[source]
    pub error: EngineError,
    pub stats: LoadStats,
}
