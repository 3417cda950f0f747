use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::debug;

use super::error::SinkError;
use super::traits::{BulkSink, QueryTarget};
use crate::domain::analytics::{GroupTotals, OverviewTotals, TOP_GROUPS};
use crate::domain::query::{AMOUNT_RANGE, CITY_PREFIX, PAGE_SIZE};
use crate::domain::{AnalyticsParts, Batch, Entity, QueryShape, Record, TransactionAnalytics};

/// Database every collection lives in
pub const DATABASE_NAME: &str = "showdown_benchmark";

/// Document store destination backed by the official driver
#[derive(Debug, Clone)]
pub struct MongoSink {
    client: Client,
    database: Database,
}

impl MongoSink {
    /// Build a client for `uri`; no round trip happens until the first call
    pub async fn connect(uri: &str) -> Result<Self, SinkError> {
        let client = Client::with_uri_str(uri).await?;
        let database = client.database(DATABASE_NAME);
        Ok(Self { client, database })
    }

    fn collection(&self, entity: Entity) -> Collection<Document> {
        self.database.collection(entity.collection())
    }

    fn transactions(&self) -> Collection<Document> {
        self.collection(Entity::Transactions)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, SinkError> {
        Ok(self
            .transactions()
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?)
    }

    async fn distinct_count(&self, field: &str) -> Result<u64, SinkError> {
        let values = self.transactions().distinct(field, doc! {}).await?;
        Ok(values.len() as u64)
    }
}

fn overview_pipeline() -> Vec<Document> {
    vec![doc! {
        "$group": {
            "_id": null,
            "totalTransactions": { "$sum": 1 },
            "totalAmount": { "$sum": "$amount" },
            "maxAmount": { "$max": "$amount" },
            "minAmount": { "$min": "$amount" },
            "chipTransactions": { "$sum": { "$cond": ["$use_chip", 1, 0] } }
        }
    }]
}

/// Group transactions by `key`, largest first by `order_by`
fn group_pipeline(key: &str, order_by: &str, limit: Option<usize>) -> Vec<Document> {
    let mut sort = Document::new();
    sort.insert(order_by, -1);
    sort.insert("_id", 1);

    let mut pipeline = vec![
        doc! {
            "$group": {
                "_id": key,
                "count": { "$sum": 1 },
                "totalAmount": { "$sum": "$amount" }
            }
        },
        doc! { "$sort": sort },
    ];
    if let Some(limit) = limit {
        pipeline.push(doc! { "$limit": limit as i64 });
    }
    pipeline
}

/// Join each transaction to its card, dropping those without one, then group by brand
fn card_brand_pipeline() -> Vec<Document> {
    let mut pipeline = vec![
        doc! {
            "$lookup": {
                "from": Entity::Cards.collection(),
                "localField": "card_id",
                "foreignField": "id",
                "as": "card"
            }
        },
        doc! { "$unwind": "$card" },
    ];
    pipeline.extend(group_pipeline("$card.card_brand", "totalAmount", None));
    pipeline
}

fn number(document: &Document, key: &str) -> Option<f64> {
    match document.get(key)? {
        Bson::Double(value) => Some(*value),
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        _ => None,
    }
}

fn count(document: &Document, key: &str) -> u64 {
    match document.get(key) {
        Some(Bson::Int32(value)) => u64::try_from(*value).unwrap_or(0),
        Some(Bson::Int64(value)) => u64::try_from(*value).unwrap_or(0),
        _ => 0,
    }
}

fn totals(document: &Document) -> GroupTotals {
    GroupTotals::new(
        count(document, "count"),
        number(document, "totalAmount").unwrap_or(0.0),
    )
}

fn groups(rows: Vec<Document>) -> Vec<(String, GroupTotals)> {
    rows.iter()
        .map(|row| {
            let name = match row.get("_id") {
                Some(Bson::String(name)) => name.clone(),
                Some(Bson::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            (name, totals(row))
        })
        .collect()
}

/// Raw output of the analytics aggregations
#[derive(Debug, Default)]
struct Aggregates {
    overview: Vec<Document>,
    cities: Vec<Document>,
    states: Vec<Document>,
    mccs: Vec<Document>,
    brands: Vec<Document>,
    channels: Vec<Document>,
    unique_clients: u64,
    unique_cards: u64,
    unique_merchants: u64,
}

impl From<Aggregates> for AnalyticsParts {
    fn from(rows: Aggregates) -> Self {
        let mut overview = OverviewTotals {
            unique_clients: rows.unique_clients,
            unique_cards: rows.unique_cards,
            unique_merchants: rows.unique_merchants,
            ..OverviewTotals::default()
        };
        if let Some(row) = rows.overview.first() {
            overview.transactions = count(row, "totalTransactions");
            overview.amount = number(row, "totalAmount").unwrap_or(0.0);
            overview.max_amount = number(row, "maxAmount");
            overview.min_amount = number(row, "minAmount");
            overview.chip_transactions = count(row, "chipTransactions");
        }

        let mut parts = AnalyticsParts {
            overview,
            cities: groups(rows.cities),
            states: groups(rows.states),
            mccs: groups(rows.mccs),
            card_brands: groups(rows.brands),
            ..AnalyticsParts::default()
        };
        for row in &rows.channels {
            match row.get("_id") {
                Some(Bson::Boolean(true)) => parts.chip = totals(row),
                _ => parts.swipe = totals(row),
            }
        }
        parts
    }
}

#[async_trait]
impl BulkSink for MongoSink {
    fn name(&self) -> &str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), SinkError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn drop_existing(&self, entity: Entity) -> Result<(), SinkError> {
        self.collection(entity).drop().await?;
        debug!(%entity, "Dropped collection");
        Ok(())
    }

    async fn create_schema(&self, entity: Entity) -> Result<(), SinkError> {
        self.database.create_collection(entity.collection()).await?;
        debug!(%entity, "Created collection");
        Ok(())
    }

    async fn write_batch<R: Record>(&self, batch: &Batch<R>) -> Result<u64, SinkError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let documents = batch
            .iter()
            .map(bson::to_document)
            .collect::<Result<Vec<_>, _>>()?;

        let result = self.collection(R::ENTITY).insert_many(documents).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn create_indexes(&self, entity: Entity) -> Result<(), SinkError> {
        let collection = self.collection(entity);
        for field in entity.index_fields() {
            let mut keys = Document::new();
            keys.insert(*field, 1);
            let model = IndexModel::builder().keys(keys).build();
            collection.create_index(model).await?;
        }
        debug!(%entity, count = entity.index_fields().len(), "Created indexes");
        Ok(())
    }

    async fn refresh(&self, _entities: &[Entity]) -> Result<(), SinkError> {
        Ok(())
    }

    async fn count(&self, entity: Entity) -> Result<u64, SinkError> {
        Ok(self.collection(entity).count_documents(doc! {}).await?)
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[async_trait]
impl QueryTarget for MongoSink {
    fn label(&self) -> &str {
        "mongodb"
    }

    fn display_name(&self) -> &str {
        "MongoDB"
    }

    async fn run_query(&self, shape: QueryShape) -> Result<u64, SinkError> {
        let transactions = self.transactions();
        let page = PAGE_SIZE as i64;

        let rows: Vec<Document> = match shape {
            QueryShape::AllTransactions => {
                transactions
                    .find(doc! {})
                    .limit(page)
                    .await?
                    .try_collect()
                    .await?
            }
            QueryShape::SumAmounts => {
                let pipeline = [doc! {
                    "$group": {
                        "_id": null,
                        "totalAmount": { "$sum": "$amount" },
                        "count": { "$sum": 1 }
                    }
                }];
                transactions.aggregate(pipeline).await?.try_collect().await?
            }
            QueryShape::LargestTransaction => {
                transactions
                    .find(doc! {})
                    .sort(doc! { "amount": -1 })
                    .limit(1)
                    .await?
                    .try_collect()
                    .await?
            }
            QueryShape::AmountRange => {
                let (low, high) = AMOUNT_RANGE;
                transactions
                    .find(doc! { "amount": { "$gte": low, "$lte": high } })
                    .limit(page)
                    .await?
                    .try_collect()
                    .await?
            }
            QueryShape::MerchantCityPrefix => {
                let pattern = format!("^{CITY_PREFIX}");
                transactions
                    .find(doc! { "merchant_city": { "$regex": pattern } })
                    .limit(page)
                    .await?
                    .try_collect()
                    .await?
            }
        };

        Ok(rows.len() as u64)
    }

    async fn analytics(&self) -> Result<TransactionAnalytics, SinkError> {
        let top = Some(TOP_GROUPS);
        let (overview, cities, states, mccs, brands, channels) = tokio::try_join!(
            self.aggregate(overview_pipeline()),
            self.aggregate(group_pipeline("$merchant_city", "count", top)),
            self.aggregate(group_pipeline("$merchant_state", "count", top)),
            self.aggregate(group_pipeline("$mcc", "totalAmount", top)),
            self.aggregate(card_brand_pipeline()),
            self.aggregate(group_pipeline("$use_chip", "count", None)),
        )?;
        let (unique_clients, unique_cards, unique_merchants) = tokio::try_join!(
            self.distinct_count("client_id"),
            self.distinct_count("card_id"),
            self.distinct_count("merchant_id"),
        )?;

        let parts = AnalyticsParts::from(Aggregates {
            overview,
            cities,
            states,
            mccs,
            brands,
            channels,
            unique_clients,
            unique_cards,
            unique_merchants,
        });
        debug!(transactions = parts.overview.transactions, "Computed transaction analytics");
        Ok(parts.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_pipeline_sorts_then_limits() {
        let pipeline = group_pipeline("$merchant_city", "count", Some(TOP_GROUPS));
        assert_eq!(pipeline.len(), 3);
        assert_eq!(
            pipeline[0].get_document("$group").unwrap().get_str("_id").unwrap(),
            "$merchant_city"
        );

        let sort = pipeline[1].get_document("$sort").unwrap();
        let keys: Vec<_> = sort.keys().map(String::as_str).collect();
        assert_eq!(keys, ["count", "_id"]);
        assert_eq!(sort.get_i32("count").unwrap(), -1);
        assert_eq!(pipeline[2].get_i64("$limit").unwrap(), 10);
    }

    #[test]
    fn card_brand_pipeline_joins_cards_without_limit() {
        let pipeline = card_brand_pipeline();
        let lookup = pipeline[0].get_document("$lookup").unwrap();
        assert_eq!(lookup.get_str("from").unwrap(), "cards");
        assert_eq!(lookup.get_str("localField").unwrap(), "card_id");
        assert_eq!(pipeline[1].get_str("$unwind").unwrap(), "$card");
        assert!(pipeline.iter().all(|stage| !stage.contains_key("$limit")));
    }

    #[test]
    fn aggregates_become_report_inputs() {
        let parts = AnalyticsParts::from(Aggregates {
            overview: vec![doc! {
                "_id": null,
                "totalTransactions": 3_i32,
                "totalAmount": 120.5,
                "maxAmount": 100.0,
                "minAmount": -2.5_f64,
                "chipTransactions": 2_i64
            }],
            cities: vec![doc! { "_id": "Beulah", "count": 3_i32, "totalAmount": 120.5 }],
            mccs: vec![doc! { "_id": null, "count": 1_i32, "totalAmount": 4_i32 }],
            channels: vec![
                doc! { "_id": false, "count": 1_i32, "totalAmount": 23.0 },
                doc! { "_id": true, "count": 2_i32, "totalAmount": 97.5 },
            ],
            unique_cards: 2,
            ..Aggregates::default()
        });

        assert_eq!(parts.overview.transactions, 3);
        assert_eq!(parts.overview.min_amount, Some(-2.5));
        assert_eq!(parts.overview.chip_transactions, 2);
        assert_eq!(parts.overview.unique_cards, 2);
        assert_eq!(parts.cities, [("Beulah".to_string(), GroupTotals::new(3, 120.5))]);
        assert_eq!(parts.mccs, [(String::new(), GroupTotals::new(1, 4.0))]);
        assert_eq!(parts.chip, GroupTotals::new(2, 97.5));
        assert_eq!(parts.swipe, GroupTotals::new(1, 23.0));
    }

    #[test]
    fn empty_collection_has_no_extremes() {
        let parts = AnalyticsParts::from(Aggregates::default());
        assert_eq!(parts.overview, OverviewTotals::default());
        assert_eq!(parts.overview.max_amount, None);
    }
}
