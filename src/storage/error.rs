use thiserror::Error;

/// Destination-level errors; any of these ends a load
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON encoding error: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Bulk write to {index} failed for {failed} documents: {reason}")]
    BulkRejected {
        index: String,
        failed: usize,
        reason: String,
    },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Injected failure: {0}")]
    Injected(String),
}

/// Outcome of an operation applied to both destinations where at least one failed
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("{failed} failed ({succeeded} succeeded): {source}")]
    Partial {
        succeeded: String,
        failed: String,
        /// Records the succeeding destination acknowledged, for writes
        accepted: u64,
        #[source]
        source: SinkError,
    },

    #[error("{first_sink} failed: {first}; {second_sink} failed: {second}")]
    Both {
        first_sink: String,
        first: SinkError,
        second_sink: String,
        second: SinkError,
    },
}

impl WriteError {
    /// Names of the destinations that failed
    pub fn failed_sinks(&self) -> Vec<&str> {
        match self {
            Self::Partial { failed, .. } => vec![failed.as_str()],
            Self::Both {
                first_sink,
                second_sink,
                ..
            } => vec![first_sink.as_str(), second_sink.as_str()],
        }
    }
}
