use async_trait::async_trait;

use super::error::SinkError;
use crate::domain::{Batch, Entity, QueryShape, Record, TransactionAnalytics};

/// A destination that accepts bulk writes of normalized records
///
/// Schema steps are per entity so the pipeline controls ordering; a sink
/// never decides on its own to drop or recreate anything.
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Destination name used in stats and logs
    fn name(&self) -> &str;

    /// Check the destination is reachable
    async fn ping(&self) -> Result<(), SinkError>;

    /// Drop the entity's collection or index; absent is not an error
    async fn drop_existing(&self, entity: Entity) -> Result<(), SinkError>;

    /// Create the entity's collection or index (with mappings)
    async fn create_schema(&self, entity: Entity) -> Result<(), SinkError>;

    /// Write one batch, returning the number of records acknowledged
    async fn write_batch<R: Record>(&self, batch: &Batch<R>) -> Result<u64, SinkError>;

    /// Build secondary indexes after the bulk load
    async fn create_indexes(&self, entity: Entity) -> Result<(), SinkError>;

    /// Make written data visible to readers
    async fn refresh(&self, entities: &[Entity]) -> Result<(), SinkError>;

    /// Number of stored records for `entity`
    async fn count(&self, entity: Entity) -> Result<u64, SinkError>;

    /// Release client resources
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A database the benchmark can run query shapes against
#[async_trait]
pub trait QueryTarget: Send + Sync {
    /// Key used in reports, e.g. `mongodb`
    fn label(&self) -> &str;

    /// Human readable name, e.g. `MongoDB`
    fn display_name(&self) -> &str;

    /// Run one query, returning how many rows or documents came back
    async fn run_query(&self, shape: QueryShape) -> Result<u64, SinkError>;

    /// Overview, top breakdowns and chip share over all stored transactions
    async fn analytics(&self) -> Result<TransactionAnalytics, SinkError>;
}
