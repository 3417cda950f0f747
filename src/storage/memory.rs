use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use super::error::SinkError;
use super::traits::{BulkSink, QueryTarget};
use crate::domain::query::{AMOUNT_RANGE, CITY_PREFIX, PAGE_SIZE};
use crate::domain::{
    AnalyticsBuilder, Batch, Entity, QueryShape, Record, TransactionAnalytics, TransactionFacts,
};

#[derive(Default)]
struct Tables {
    documents: DashMap<Entity, Vec<Value>>,
    indexes: DashMap<Entity, Vec<&'static str>>,
    write_failures: DashMap<Entity, u64>,
    write_attempts: DashMap<Entity, u64>,
    query_failures: DashMap<QueryShape, String>,
    ping_fails: AtomicBool,
    mutations: AtomicU64,
}

/// In-process destination holding documents as JSON values
///
/// Used for dry runs and tests. Clones share the same tables, so a test can
/// keep a handle while the pipeline owns another. Failures can be injected
/// per entity (writes) and per query shape.
#[derive(Clone)]
pub struct InMemorySink {
    name: String,
    display_name: String,
    query_delay: Option<Duration>,
    tables: Arc<Tables>,
}

impl InMemorySink {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            query_delay: None,
            tables: Arc::new(Tables::default()),
        }
    }

    /// Stand-in for the document store
    pub fn mongodb() -> Self {
        Self::new("mongodb", "MongoDB")
    }

    /// Stand-in for the search engine
    pub fn elasticsearch() -> Self {
        Self::new("elasticsearch", "Elasticsearch")
    }

    /// Sleep this long before answering each query
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    /// Fail every write of `entity` from batch `sequence` onwards
    pub fn fail_writes(&self, entity: Entity, sequence: u64) {
        self.tables.write_failures.insert(entity, sequence);
    }

    /// Fail every run of `shape` with `message`
    pub fn fail_query(&self, shape: QueryShape, message: impl Into<String>) {
        self.tables.query_failures.insert(shape, message.into());
    }

    pub fn fail_ping(&self) {
        self.tables.ping_fails.store(true, Ordering::SeqCst);
    }

    /// Number of schema or data changes applied so far
    pub fn mutations(&self) -> u64 {
        self.tables.mutations.load(Ordering::SeqCst)
    }

    /// Calls to `write_batch` for `entity`, failed ones included
    pub fn attempts(&self, entity: Entity) -> u64 {
        self.tables
            .write_attempts
            .get(&entity)
            .map(|count| *count.value())
            .unwrap_or(0)
    }

    /// Snapshot of the stored documents for `entity`
    pub fn documents(&self, entity: Entity) -> Vec<Value> {
        self.tables
            .documents
            .get(&entity)
            .map(|docs| docs.value().clone())
            .unwrap_or_default()
    }

    pub fn has_schema(&self, entity: Entity) -> bool {
        self.tables.documents.contains_key(&entity)
    }

    pub fn indexes(&self, entity: Entity) -> Vec<&'static str> {
        self.tables
            .indexes
            .get(&entity)
            .map(|fields| fields.value().clone())
            .unwrap_or_default()
    }

    fn mutated(&self) {
        self.tables.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn evaluate(&self, shape: QueryShape) -> u64 {
        let Some(transactions) = self.tables.documents.get(&Entity::Transactions) else {
            return 0;
        };
        let matched = match shape {
            QueryShape::AllTransactions => transactions.len() as u64,
            QueryShape::SumAmounts => u64::from(!transactions.is_empty()),
            QueryShape::LargestTransaction => u64::from(!transactions.is_empty()),
            QueryShape::AmountRange => {
                let (low, high) = AMOUNT_RANGE;
                transactions
                    .iter()
                    .filter(|doc| {
                        doc["amount"]
                            .as_f64()
                            .is_some_and(|amount| (low..=high).contains(&amount))
                    })
                    .count() as u64
            }
            QueryShape::MerchantCityPrefix => transactions
                .iter()
                .filter(|doc| {
                    doc["merchant_city"]
                        .as_str()
                        .is_some_and(|city| city.starts_with(CITY_PREFIX))
                })
                .count() as u64,
        };

        matched.min(PAGE_SIZE)
    }

    /// Fold stored transactions into the analytics report, joining cards by id
    fn fold_analytics(&self) -> TransactionAnalytics {
        let brands: Vec<(String, String)> = self
            .tables
            .documents
            .get(&Entity::Cards)
            .map(|cards| {
                cards
                    .iter()
                    .filter_map(|card| {
                        Some((
                            card["id"].as_str()?.to_string(),
                            card["card_brand"].as_str()?.to_string(),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut builder = AnalyticsBuilder::with_card_brands(brands);
        if let Some(transactions) = self.tables.documents.get(&Entity::Transactions) {
            for doc in transactions.iter() {
                builder.push(TransactionFacts {
                    client_id: text(doc, "client_id"),
                    card_id: text(doc, "card_id"),
                    merchant_id: text(doc, "merchant_id"),
                    merchant_city: text(doc, "merchant_city"),
                    merchant_state: text(doc, "merchant_state"),
                    mcc: text(doc, "mcc"),
                    amount: doc["amount"].as_f64().unwrap_or(0.0),
                    use_chip: doc["use_chip"].as_bool().unwrap_or(false),
                });
            }
        }
        builder.finish().into()
    }
}

fn text<'a>(doc: &'a Value, field: &str) -> &'a str {
    doc[field].as_str().unwrap_or_default()
}

#[async_trait]
impl BulkSink for InMemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> Result<(), SinkError> {
        if self.tables.ping_fails.load(Ordering::SeqCst) {
            return Err(SinkError::Injected(format!("{} is unreachable", self.name)));
        }
        Ok(())
    }

    async fn drop_existing(&self, entity: Entity) -> Result<(), SinkError> {
        self.tables.documents.remove(&entity);
        self.tables.indexes.remove(&entity);
        self.mutated();
        Ok(())
    }

    async fn create_schema(&self, entity: Entity) -> Result<(), SinkError> {
        self.tables.documents.entry(entity).or_default();
        self.mutated();
        Ok(())
    }

    async fn write_batch<R: Record>(&self, batch: &Batch<R>) -> Result<u64, SinkError> {
        let entity = R::ENTITY;
        *self.tables.write_attempts.entry(entity).or_default() += 1;
        if let Some(from) = self.tables.write_failures.get(&entity)
            && batch.sequence() >= *from
        {
            return Err(SinkError::Injected(format!(
                "{} rejected {entity} batch {}",
                self.name,
                batch.sequence()
            )));
        }

        let documents = batch
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let written = documents.len() as u64;

        self.tables
            .documents
            .entry(entity)
            .or_default()
            .extend(documents);
        self.mutated();

        debug!(sink = %self.name, %entity, written, "Stored batch in memory");
        Ok(written)
    }

    async fn create_indexes(&self, entity: Entity) -> Result<(), SinkError> {
        self.tables
            .indexes
            .insert(entity, entity.index_fields().to_vec());
        self.mutated();
        Ok(())
    }

    async fn refresh(&self, _entities: &[Entity]) -> Result<(), SinkError> {
        Ok(())
    }

    async fn count(&self, entity: Entity) -> Result<u64, SinkError> {
        Ok(self
            .tables
            .documents
            .get(&entity)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl QueryTarget for InMemorySink {
    fn label(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn run_query(&self, shape: QueryShape) -> Result<u64, SinkError> {
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.tables.query_failures.get(&shape) {
            return Err(SinkError::Injected(message.value().clone()));
        }

        Ok(self.evaluate(shape))
    }

    async fn analytics(&self) -> Result<TransactionAnalytics, SinkError> {
        Ok(self.fold_analytics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, CardRecord, TransactionRecord};

    fn transaction(id: &str, amount: f64, city: &str) -> TransactionRecord {
        TransactionRecord {
            id: id.to_string(),
            date: None,
            client_id: "1".to_string(),
            card_id: "1".to_string(),
            amount: Amount::from_raw((amount * 10_000.0) as i64),
            use_chip: true,
            merchant_id: "9".to_string(),
            merchant_city: city.to_string(),
            merchant_state: "CA".to_string(),
            zip: "94101".to_string(),
            mcc: "5411".to_string(),
        }
    }

    async fn seeded() -> InMemorySink {
        let sink = InMemorySink::mongodb();
        sink.create_schema(Entity::Transactions).await.unwrap();
        let batch = Batch::new(
            0,
            vec![
                transaction("1", 50.0, "San Jose"),
                transaction("2", 150.0, "Fresno"),
                transaction("3", 450.0, "Santa Ana"),
                transaction("4", 900.0, "Oakland"),
            ],
        );
        sink.write_batch(&batch).await.unwrap();
        sink
    }

    #[tokio::test]
    async fn stores_batches_per_entity() {
        let sink = seeded().await;
        assert_eq!(sink.count(Entity::Transactions).await.unwrap(), 4);
        assert_eq!(sink.count(Entity::Users).await.unwrap(), 0);
        assert_eq!(sink.documents(Entity::Transactions)[1]["amount"], 150.0);
        assert_eq!(sink.mutations(), 2);
        assert_eq!(sink.attempts(Entity::Transactions), 1);
        assert_eq!(sink.attempts(Entity::Users), 0);
    }

    #[tokio::test]
    async fn drop_clears_documents_and_indexes() {
        let sink = seeded().await;
        sink.create_indexes(Entity::Transactions).await.unwrap();
        assert!(sink.indexes(Entity::Transactions).contains(&"merchant_city"));

        sink.drop_existing(Entity::Transactions).await.unwrap();
        assert!(!sink.has_schema(Entity::Transactions));
        assert!(sink.indexes(Entity::Transactions).is_empty());
        assert_eq!(sink.count(Entity::Transactions).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_write_failure_from_sequence() {
        let sink = InMemorySink::elasticsearch();
        sink.fail_writes(Entity::Transactions, 1);

        let first = Batch::new(0, vec![transaction("1", 1.0, "X")]);
        let second = Batch::new(1, vec![transaction("2", 1.0, "X")]);

        assert_eq!(sink.write_batch(&first).await.unwrap(), 1);
        let result = sink.write_batch(&second).await;
        assert!(matches!(result, Err(SinkError::Injected(_))));
        assert_eq!(sink.count(Entity::Transactions).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn evaluates_query_shapes() {
        let sink = seeded().await;
        assert_eq!(sink.run_query(QueryShape::AllTransactions).await.unwrap(), 4);
        assert_eq!(sink.run_query(QueryShape::SumAmounts).await.unwrap(), 1);
        assert_eq!(sink.run_query(QueryShape::LargestTransaction).await.unwrap(), 1);
        assert_eq!(sink.run_query(QueryShape::AmountRange).await.unwrap(), 2);
        assert_eq!(
            sink.run_query(QueryShape::MerchantCityPrefix).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn queries_on_empty_store_return_nothing() {
        let sink = InMemorySink::mongodb();
        assert_eq!(sink.run_query(QueryShape::SumAmounts).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn injected_query_failure() {
        let sink = seeded().await;
        sink.fail_query(QueryShape::SumAmounts, "Timeout: aggregation took too long");

        let result = sink.run_query(QueryShape::SumAmounts).await;
        assert!(matches!(result, Err(SinkError::Injected(msg)) if msg.starts_with("Timeout")));
        assert!(sink.run_query(QueryShape::AllTransactions).await.is_ok());
    }

    #[tokio::test]
    async fn ping_failure() {
        let sink = InMemorySink::mongodb();
        assert!(sink.ping().await.is_ok());
        sink.fail_ping();
        assert!(sink.ping().await.is_err());
    }

    fn card(id: &str, brand: &str) -> CardRecord {
        CardRecord {
            id: id.to_string(),
            client_id: "1".to_string(),
            card_brand: brand.to_string(),
            card_type: "Debit".to_string(),
            card_number: "4344676511950444".to_string(),
            expires: "12/2022".to_string(),
            cvv: "623".to_string(),
            has_chip: true,
            num_cards: 2,
            credit_limit: 24295.0,
        }
    }

    #[tokio::test]
    async fn analytics_over_stored_transactions() {
        let sink = seeded().await;
        let mut swiped = transaction("5", 100.0, "Oakland");
        swiped.use_chip = false;
        swiped.card_id = "2".to_string();
        swiped.merchant_id = "10".to_string();
        sink.write_batch(&Batch::new(1, vec![swiped])).await.unwrap();
        sink.write_batch(&Batch::new(0, vec![card("1", "Visa")])).await.unwrap();

        let report = sink.analytics().await.unwrap();
        let overview = &report.overview;
        assert_eq!(overview.total_transactions, 5);
        assert_eq!(overview.total_amount, 1650.0);
        assert_eq!(overview.avg_amount, 330.0);
        assert_eq!(overview.max_amount, 900.0);
        assert_eq!(overview.min_amount, 50.0);
        assert_eq!(overview.chip_transactions, 4);
        assert_eq!(overview.chip_rate, 80.0);
        assert_eq!(overview.unique_cards, 2);
        assert_eq!(overview.unique_merchants, 2);

        assert_eq!(report.by_city[0].name, "Oakland");
        assert_eq!(report.by_city[0].count, 2);
        assert_eq!(report.by_state[0].count, 5);

        // Card 2 has no stored card, so only card 1 shows up per brand
        assert_eq!(report.by_card_brand.len(), 1);
        assert_eq!(report.by_card_brand[0].name, "Visa");
        assert_eq!(report.by_card_brand[0].count, 4);

        let channels: Vec<_> = report
            .chip_vs_swipe
            .iter()
            .map(|group| (group.name.as_str(), group.count))
            .collect();
        assert_eq!(channels, [("Chip", 4), ("Swipe", 1)]);
    }

    #[tokio::test]
    async fn analytics_on_empty_store_is_zeroed() {
        let report = InMemorySink::mongodb().analytics().await.unwrap();
        assert_eq!(report.overview.total_transactions, 0);
        assert_eq!(report.overview.chip_rate, 0.0);
        assert!(report.by_mcc.is_empty());
        assert!(report.chip_vs_swipe.is_empty());
    }
}
