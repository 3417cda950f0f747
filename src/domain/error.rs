use thiserror::Error;

/// Domain-level errors for record construction and batching
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),
}
