pub mod amount;
pub mod analytics;
pub mod batch;
pub mod coerce;
pub mod entity;
pub mod error;
pub mod query;
pub mod record;
pub mod stats;

// Re-export commonly used types
pub use amount::Amount;
pub use analytics::{AnalyticsBuilder, AnalyticsParts, TransactionAnalytics, TransactionFacts};
pub use batch::{Batch, BatchAccumulator, DEFAULT_BATCH_SIZE};
pub use coerce::RowDialect;
pub use entity::Entity;
pub use error::DomainError;
pub use query::{QueryRotation, QueryShape};
pub use record::{CardRecord, Record, TransactionRecord, UserRecord};
pub use stats::LoadStats;
