use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::amount::Amount;
use super::entity::Entity;

/// A normalized record ready for both destinations
///
/// Records are immutable once built; the serialized form is what both the
/// document store and the search engine receive.
pub trait Record: Serialize + Clone + Debug + Send + Sync + 'static {
    /// Dataset this record belongs to
    const ENTITY: Entity;

    /// Stable identity, reused as the search engine document id
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub current_age: i64,
    pub retirement_age: i64,
    pub birth_year: i64,
    pub birth_month: i64,
    pub gender: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub per_capita_income: f64,
}

impl Record for UserRecord {
    const ENTITY: Entity = Entity::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRecord {
    pub id: String,
    /// Owning user; not enforced by either store
    pub client_id: String,
    pub card_brand: String,
    pub card_type: String,
    pub card_number: String,
    pub expires: String,
    pub cvv: String,
    pub has_chip: bool,
    pub num_cards: i64,
    pub credit_limit: f64,
}

impl Record for CardRecord {
    const ENTITY: Entity = Entity::Cards;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: String,
    /// `None` when the source timestamp could not be parsed
    pub date: Option<DateTime<Utc>>,
    pub client_id: String,
    pub card_id: String,
    pub amount: Amount,
    pub use_chip: bool,
    pub merchant_id: String,
    pub merchant_city: String,
    pub merchant_state: String,
    pub zip: String,
    /// Merchant category code
    pub mcc: String,
}

impl Record for TransactionRecord {
    const ENTITY: Entity = Entity::Transactions;

    fn id(&self) -> &str {
        &self.id
    }
}
