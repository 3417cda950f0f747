use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::error::SinkError;
use super::traits::{BulkSink, QueryTarget};
use crate::domain::analytics::{GroupTotals, OverviewTotals, TOP_GROUPS};
use crate::domain::query::{AMOUNT_RANGE, CITY_PREFIX, PAGE_SIZE};
use crate::domain::{AnalyticsParts, Batch, Entity, QueryShape, Record, TransactionAnalytics};

const NDJSON: &str = "application/x-ndjson";

/// Cards fetched for the brand join; the default `max_result_window`
pub const CARD_LOOKUP_SIZE: usize = 10_000;

/// Exact distinct counts hold up to this many values
const CARDINALITY_PRECISION: u64 = 40_000;

#[derive(Debug, Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// Search engine destination speaking the HTTP API directly
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    client: Client,
    base_url: String,
}

impl ElasticsearchSink {
    pub fn new(base_url: &str) -> Result<Self, SinkError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn search(&self, body: Value) -> Result<Value, SinkError> {
        self.search_index(Entity::Transactions, body).await
    }

    async fn search_index(&self, entity: Entity, body: Value) -> Result<Value, SinkError> {
        let index = entity.collection();
        let response = self
            .client
            .post(self.url(&format!("{index}/_search")))
            .json(&body)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SinkError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Build a `_bulk` payload: one action line and one source line per record
pub fn bulk_body<R: Record>(batch: &Batch<R>) -> Result<String, SinkError> {
    let index = R::ENTITY.collection();
    let mut body = String::new();

    for record in batch.iter() {
        let action = json!({ "index": { "_index": index, "_id": record.id() } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(record)?);
        body.push('\n');
    }

    Ok(body)
}

fn search_body(shape: QueryShape) -> Value {
    match shape {
        QueryShape::AllTransactions => json!({
            "query": { "match_all": {} },
            "size": PAGE_SIZE
        }),
        QueryShape::SumAmounts => json!({
            "size": 0,
            "aggs": {
                "total_amount": { "sum": { "field": "amount" } },
                "count": { "value_count": { "field": "amount" } }
            }
        }),
        QueryShape::LargestTransaction => json!({
            "query": { "match_all": {} },
            "sort": [{ "amount": { "order": "desc" } }],
            "size": 1
        }),
        QueryShape::AmountRange => {
            let (low, high) = AMOUNT_RANGE;
            json!({
                "query": { "range": { "amount": { "gte": low, "lte": high } } },
                "size": PAGE_SIZE
            })
        }
        QueryShape::MerchantCityPrefix => json!({
            "query": { "prefix": { "merchant_city": CITY_PREFIX } },
            "size": PAGE_SIZE
        }),
    }
}

fn grouped(field: &str, order_by: &str, size: usize) -> Value {
    json!({
        "terms": {
            "field": field,
            "size": size,
            "order": [{ order_by: "desc" }, { "_key": "asc" }]
        },
        "aggs": { "total_amount": { "sum": { "field": "amount" } } }
    })
}

/// One aggregation-only search covering every part of the analytics report
///
/// The search engine cannot join, so card brands are resolved afterwards
/// from the per-card buckets.
pub fn analytics_body() -> Value {
    let distinct = |field: &str| {
        json!({ "cardinality": { "field": field, "precision_threshold": CARDINALITY_PRECISION } })
    };

    json!({
        "size": 0,
        "track_total_hits": true,
        "aggs": {
            "total_amount": { "sum": { "field": "amount" } },
            "max_amount": { "max": { "field": "amount" } },
            "min_amount": { "min": { "field": "amount" } },
            "chip_transactions": { "filter": { "term": { "use_chip": true } } },
            "unique_clients": distinct("client_id"),
            "unique_cards": distinct("card_id"),
            "unique_merchants": distinct("merchant_id"),
            "by_city": grouped("merchant_city", "_count", TOP_GROUPS),
            "by_state": grouped("merchant_state", "_count", TOP_GROUPS),
            "by_mcc": grouped("mcc", "total_amount", TOP_GROUPS),
            "by_card": grouped("card_id", "total_amount", CARD_LOOKUP_SIZE),
            "by_chip": grouped("use_chip", "_count", 2)
        }
    })
}

fn card_lookup_body() -> Value {
    json!({
        "size": CARD_LOOKUP_SIZE,
        "_source": ["id", "card_brand"],
        "query": { "match_all": {} }
    })
}

fn card_brands(response: &Value) -> HashMap<String, String> {
    response["hits"]["hits"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|hit| {
            let source = &hit["_source"];
            Some((
                source["id"].as_str()?.to_string(),
                source["card_brand"].as_str()?.to_string(),
            ))
        })
        .collect()
}

fn buckets(aggregations: &Value, name: &str) -> Vec<(String, GroupTotals)> {
    aggregations[name]["buckets"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|bucket| {
            let key = match (&bucket["key_as_string"], &bucket["key"]) {
                (Value::String(key), _) | (_, Value::String(key)) => key.clone(),
                (_, Value::Null) => String::new(),
                (_, other) => other.to_string(),
            };
            let totals = GroupTotals::new(
                bucket["doc_count"].as_u64().unwrap_or(0),
                bucket["total_amount"]["value"].as_f64().unwrap_or(0.0),
            );
            (key, totals)
        })
        .collect()
}

fn metric<'a>(aggregations: &'a Value, name: &str) -> &'a Value {
    &aggregations[name]["value"]
}

/// Turn the aggregation response plus the card lookup into report inputs
pub fn analytics_parts(
    response: &Value,
    brands: &HashMap<String, String>,
) -> Result<AnalyticsParts, SinkError> {
    let aggregations = response.get("aggregations").ok_or_else(|| {
        SinkError::UnexpectedResponse("search response has no aggregations".to_string())
    })?;

    let overview = OverviewTotals {
        transactions: response["hits"]["total"]["value"].as_u64().unwrap_or(0),
        amount: metric(aggregations, "total_amount").as_f64().unwrap_or(0.0),
        max_amount: metric(aggregations, "max_amount").as_f64(),
        min_amount: metric(aggregations, "min_amount").as_f64(),
        chip_transactions: aggregations["chip_transactions"]["doc_count"]
            .as_u64()
            .unwrap_or(0),
        unique_clients: metric(aggregations, "unique_clients").as_u64().unwrap_or(0),
        unique_cards: metric(aggregations, "unique_cards").as_u64().unwrap_or(0),
        unique_merchants: metric(aggregations, "unique_merchants").as_u64().unwrap_or(0),
    };

    let mut by_brand: HashMap<String, GroupTotals> = HashMap::new();
    for (card_id, totals) in buckets(aggregations, "by_card") {
        if let Some(brand) = brands.get(&card_id) {
            let entry = by_brand.entry(brand.clone()).or_default();
            entry.count += totals.count;
            entry.amount += totals.amount;
        }
    }

    let mut parts = AnalyticsParts {
        overview,
        cities: buckets(aggregations, "by_city"),
        states: buckets(aggregations, "by_state"),
        mccs: buckets(aggregations, "by_mcc"),
        card_brands: by_brand.into_iter().collect(),
        ..AnalyticsParts::default()
    };
    for (key, totals) in buckets(aggregations, "by_chip") {
        if key == "true" {
            parts.chip = totals;
        } else {
            parts.swipe = totals;
        }
    }
    Ok(parts)
}

#[async_trait]
impl BulkSink for ElasticsearchSink {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn ping(&self) -> Result<(), SinkError> {
        let response = self.client.get(self.url("/")).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn drop_existing(&self, entity: Entity) -> Result<(), SinkError> {
        let response = self
            .client
            .delete(self.url(entity.collection()))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(%entity, "Index did not exist");
            return Ok(());
        }
        ensure_success(response).await?;
        debug!(%entity, "Deleted index");
        Ok(())
    }

    async fn create_schema(&self, entity: Entity) -> Result<(), SinkError> {
        let response = self
            .client
            .put(self.url(entity.collection()))
            .json(&entity.search_mapping())
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(%entity, "Created index with mapping");
        Ok(())
    }

    async fn write_batch<R: Record>(&self, batch: &Batch<R>) -> Result<u64, SinkError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let response = self
            .client
            .post(self.url("_bulk"))
            .header(CONTENT_TYPE, NDJSON)
            .body(bulk_body(batch)?)
            .send()
            .await?;
        let bulk: BulkResponse = ensure_success(response).await?.json().await?;

        if bulk.errors {
            let errors: Vec<&Value> = bulk
                .items
                .iter()
                .filter_map(|item| item.get("index").and_then(|op| op.get("error")))
                .collect();
            let reason = errors
                .first()
                .and_then(|error| error.get("reason").or_else(|| error.get("type")))
                .and_then(Value::as_str)
                .unwrap_or("unknown bulk error")
                .to_string();

            warn!(entity = %R::ENTITY, failed = errors.len(), %reason, "Bulk write rejected");
            return Err(SinkError::BulkRejected {
                index: R::ENTITY.collection().to_string(),
                failed: errors.len(),
                reason,
            });
        }

        Ok(batch.len() as u64)
    }

    async fn create_indexes(&self, entity: Entity) -> Result<(), SinkError> {
        debug!(%entity, "Mappings already define the searchable fields");
        Ok(())
    }

    async fn refresh(&self, entities: &[Entity]) -> Result<(), SinkError> {
        if entities.is_empty() {
            return Ok(());
        }

        let indices = entities
            .iter()
            .map(Entity::collection)
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .client
            .post(self.url(&format!("{indices}/_refresh")))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn count(&self, entity: Entity) -> Result<u64, SinkError> {
        let response = self
            .client
            .get(self.url(&format!("{}/_count", entity.collection())))
            .send()
            .await?;
        let count: CountResponse = ensure_success(response).await?.json().await?;
        Ok(count.count)
    }
}

#[async_trait]
impl QueryTarget for ElasticsearchSink {
    fn label(&self) -> &str {
        "elasticsearch"
    }

    fn display_name(&self) -> &str {
        "Elasticsearch"
    }

    async fn run_query(&self, shape: QueryShape) -> Result<u64, SinkError> {
        let result = self.search(search_body(shape)).await?;

        if shape == QueryShape::SumAmounts {
            return Ok(u64::from(result.get("aggregations").is_some()));
        }

        result["hits"]["hits"]
            .as_array()
            .map(|hits| hits.len() as u64)
            .ok_or_else(|| SinkError::UnexpectedResponse("search response has no hits".to_string()))
    }

    async fn analytics(&self) -> Result<TransactionAnalytics, SinkError> {
        let (response, cards) = tokio::try_join!(
            self.search(analytics_body()),
            self.search_index(Entity::Cards, card_lookup_body()),
        )?;
        let brands = card_brands(&cards);
        if brands.len() >= CARD_LOOKUP_SIZE {
            warn!(limit = CARD_LOOKUP_SIZE, "Card lookup truncated; brand totals are partial");
        }

        let parts = analytics_parts(&response, &brands)?;
        debug!(transactions = parts.overview.transactions, "Computed transaction analytics");
        Ok(parts.into())
    }
}
