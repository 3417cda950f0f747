use tracing::{debug, warn};

use super::error::{SinkError, WriteError};
use super::traits::BulkSink;
use crate::domain::{Batch, Entity, Record};

/// Records acknowledged by each destination for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledged {
    pub document: u64,
    pub search: u64,
}

/// Applies every operation to the document store and the search engine
///
/// Both sides run concurrently and the call returns only once both have
/// settled. A failure on either side is returned as is: nothing is retried
/// and nothing already written is rolled back.
pub struct DualSinkWriter<D, S> {
    document: D,
    search: S,
}

impl<D, S> DualSinkWriter<D, S>
where
    D: BulkSink,
    S: BulkSink,
{
    pub fn new(document: D, search: S) -> Self {
        Self { document, search }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn search(&self) -> &S {
        &self.search
    }

    /// Destination names, document store first
    pub fn names(&self) -> [&str; 2] {
        [self.document.name(), self.search.name()]
    }

    /// Write one batch to both destinations
    pub async fn write<R: Record>(&self, batch: &Batch<R>) -> Result<Acknowledged, WriteError> {
        let (document, search) = tokio::join!(
            self.document.write_batch(batch),
            self.search.write_batch(batch)
        );

        let accepted = match (&document, &search) {
            (Ok(n), Err(_)) | (Err(_), Ok(n)) => *n,
            _ => 0,
        };

        let (document, search) = self.settle(document, search).map_err(|error| match error {
            WriteError::Partial {
                succeeded,
                failed,
                source,
                ..
            } => WriteError::Partial {
                succeeded,
                failed,
                accepted,
                source,
            },
            both => both,
        })?;

        debug!(
            entity = %R::ENTITY,
            sequence = batch.sequence(),
            document,
            search,
            "Batch written to both destinations"
        );
        Ok(Acknowledged { document, search })
    }

    pub async fn ping(&self) -> Result<(), WriteError> {
        let (document, search) = tokio::join!(self.document.ping(), self.search.ping());
        self.settle(document, search).map(|_| ())
    }

    pub async fn drop_existing(&self, entity: Entity) -> Result<(), WriteError> {
        let (document, search) = tokio::join!(
            self.document.drop_existing(entity),
            self.search.drop_existing(entity)
        );
        self.settle(document, search).map(|_| ())
    }

    pub async fn create_schema(&self, entity: Entity) -> Result<(), WriteError> {
        let (document, search) = tokio::join!(
            self.document.create_schema(entity),
            self.search.create_schema(entity)
        );
        self.settle(document, search).map(|_| ())
    }

    pub async fn create_indexes(&self, entity: Entity) -> Result<(), WriteError> {
        let (document, search) = tokio::join!(
            self.document.create_indexes(entity),
            self.search.create_indexes(entity)
        );
        self.settle(document, search).map(|_| ())
    }

    pub async fn refresh(&self, entities: &[Entity]) -> Result<(), WriteError> {
        let (document, search) = tokio::join!(
            self.document.refresh(entities),
            self.search.refresh(entities)
        );
        self.settle(document, search).map(|_| ())
    }

    /// Stored record counts for `entity`, document store first
    pub async fn counts(&self, entity: Entity) -> Result<Acknowledged, WriteError> {
        let (document, search) =
            tokio::join!(self.document.count(entity), self.search.count(entity));
        self.settle(document, search)
            .map(|(document, search)| Acknowledged { document, search })
    }

    /// Close both clients; failures are logged, not returned
    pub async fn close(&self) {
        let (document, search) = tokio::join!(self.document.close(), self.search.close());
        if let Err(error) = self.settle(document, search) {
            warn!(%error, "Error closing destinations");
        }
    }

    fn settle<A, B>(
        &self,
        document: Result<A, SinkError>,
        search: Result<B, SinkError>,
    ) -> Result<(A, B), WriteError> {
        let [document_name, search_name] = self.names().map(str::to_string);
        match (document, search) {
            (Ok(document), Ok(search)) => Ok((document, search)),
            (Err(first), Err(second)) => Err(WriteError::Both {
                first_sink: document_name,
                first,
                second_sink: search_name,
                second,
            }),
            (Err(source), Ok(_)) => Err(WriteError::Partial {
                succeeded: search_name,
                failed: document_name,
                accepted: 0,
                source,
            }),
            (Ok(_), Err(source)) => Err(WriteError::Partial {
                succeeded: document_name,
                failed: search_name,
                accepted: 0,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRecord;
    use crate::storage::InMemorySink;

    fn user(id: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            current_age: 30,
            retirement_age: 65,
            birth_year: 1994,
            birth_month: 1,
            gender: "Male".to_string(),
            address: "1 Main St".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            per_capita_income: 0.0,
        }
    }

    fn batch(sequence: u64) -> Batch<UserRecord> {
        Batch::new(sequence, vec![user("1"), user("2"), user("3")])
    }

    fn writer() -> (DualSinkWriter<InMemorySink, InMemorySink>, InMemorySink, InMemorySink) {
        let mongo = InMemorySink::mongodb();
        let elastic = InMemorySink::elasticsearch();
        (
            DualSinkWriter::new(mongo.clone(), elastic.clone()),
            mongo,
            elastic,
        )
    }

    #[tokio::test]
    async fn writes_batch_to_both() {
        let (writer, mongo, elastic) = writer();
        let ack = writer.write(&batch(0)).await.unwrap();

        assert_eq!(ack, Acknowledged { document: 3, search: 3 });
        assert_eq!(mongo.count(Entity::Users).await.unwrap(), 3);
        assert_eq!(elastic.count(Entity::Users).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn one_failing_sink_is_reported_without_retry() {
        let (writer, mongo, elastic) = writer();
        elastic.fail_writes(Entity::Users, 0);

        let result = writer.write(&batch(0)).await;
        match result {
            Err(WriteError::Partial {
                succeeded,
                failed,
                accepted,
                ..
            }) => {
                assert_eq!(succeeded, "mongodb");
                assert_eq!(failed, "elasticsearch");
                assert_eq!(accepted, 3);
            }
            other => panic!("Expected Partial, got {other:?}"),
        }

        // The successful side keeps its write; the failing side was tried once
        assert_eq!(mongo.count(Entity::Users).await.unwrap(), 3);
        assert_eq!(elastic.count(Entity::Users).await.unwrap(), 0);
        assert_eq!(elastic.mutations(), 0);
        assert_eq!(elastic.attempts(Entity::Users), 1);
        assert_eq!(mongo.attempts(Entity::Users), 1);
    }

    #[tokio::test]
    async fn both_failures_are_reported() {
        let (writer, mongo, elastic) = writer();
        mongo.fail_writes(Entity::Users, 0);
        elastic.fail_writes(Entity::Users, 0);

        let result = writer.write(&batch(0)).await;
        assert!(matches!(result, Err(WriteError::Both { .. })));
        assert_eq!(mongo.attempts(Entity::Users), 1);
        assert_eq!(elastic.attempts(Entity::Users), 1);
    }

    #[tokio::test]
    async fn each_batch_is_written_once_per_sink() {
        let (writer, mongo, elastic) = writer();
        elastic.fail_writes(Entity::Users, 1);

        writer.write(&batch(0)).await.unwrap();
        assert!(writer.write(&batch(1)).await.is_err());

        assert_eq!(mongo.attempts(Entity::Users), 2);
        assert_eq!(elastic.attempts(Entity::Users), 2);
        assert_eq!(mongo.count(Entity::Users).await.unwrap(), 6);
        assert_eq!(elastic.count(Entity::Users).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn schema_operations_touch_both() {
        let (writer, mongo, elastic) = writer();
        writer.create_schema(Entity::Cards).await.unwrap();
        writer.create_indexes(Entity::Cards).await.unwrap();

        assert!(mongo.has_schema(Entity::Cards));
        assert!(elastic.has_schema(Entity::Cards));
        assert_eq!(mongo.indexes(Entity::Cards), vec!["id", "client_id", "card_brand"]);

        writer.drop_existing(Entity::Cards).await.unwrap();
        assert!(!mongo.has_schema(Entity::Cards));
        assert!(!elastic.has_schema(Entity::Cards));
    }

    #[tokio::test]
    async fn ping_failure_names_the_sink() {
        let (writer, mongo, _elastic) = writer();
        mongo.fail_ping();

        let error = writer.ping().await.unwrap_err();
        assert_eq!(error.failed_sinks(), vec!["mongodb"]);
    }

    #[tokio::test]
    async fn counts_come_from_each_side() {
        let (writer, mongo, _elastic) = writer();
        mongo.write_batch(&batch(0)).await.unwrap();

        let counts = writer.counts(Entity::Users).await.unwrap();
        assert_eq!(counts, Acknowledged { document: 3, search: 0 });
    }
}
