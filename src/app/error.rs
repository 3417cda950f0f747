use std::io;
use thiserror::Error;

use crate::domain::DomainError;
use crate::engine::{EngineError, LoadFailure};
use crate::io::IoError;
use crate::storage::{SinkError, WriteError};

/// Top-level application errors unifying all layer errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Input error: {0}")]
    Input(#[from] IoError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Load(#[from] LoadFailure),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LoadStats;
    use crate::engine::LoadState;

    #[test]
    fn error_display_formats_correctly() {
        assert_eq!(
            AppError::InvalidArguments("operations must be positive".to_string()).to_string(),
            "Invalid arguments: operations must be positive"
        );
        assert_eq!(
            AppError::Sink(SinkError::Rejected {
                status: 503,
                body: "unavailable".to_string()
            })
            .to_string(),
            format!(
                "Sink error: {}",
                SinkError::Rejected {
                    status: 503,
                    body: "unavailable".to_string()
                }
            )
        );
    }

    #[test]
    fn io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed");
        match AppError::from(io_err) {
            AppError::Io(_) => {}
            _ => panic!("Expected Io error variant"),
        }
    }

    #[test]
    fn domain_error_conversion() {
        match AppError::from(DomainError::InvalidBatchSize(0)) {
            AppError::Domain(DomainError::InvalidBatchSize(0)) => {}
            _ => panic!("Expected Domain error variant"),
        }
    }

    #[test]
    fn load_failure_keeps_its_message() {
        let failure = LoadFailure {
            state: LoadState::LoadingCards,
            error: EngineError::Domain(DomainError::InvalidBatchSize(0)),
            stats: LoadStats::new(),
        };
        let expected = failure.to_string();

        let app_err = AppError::from(failure);
        assert!(matches!(app_err, AppError::Load(_)));
        assert_eq!(app_err.to_string(), expected);
    }
}
