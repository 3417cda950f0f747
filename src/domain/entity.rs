use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

/// The three datasets, in load order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Users,
    Cards,
    Transactions,
}

impl Entity {
    /// Load order: transactions reference users and cards
    pub const ALL: [Entity; 3] = [Entity::Users, Entity::Cards, Entity::Transactions];

    /// Collection name in the document store, index name in the search engine
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Cards => "cards",
            Self::Transactions => "transactions",
        }
    }

    /// Filename substring used to discover the entity's CSV file
    pub fn file_token(&self) -> &'static str {
        self.collection()
    }

    /// Secondary indexes created after the bulk load (ascending, single field)
    pub fn index_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Users => &["id"],
            Self::Cards => &["id", "client_id", "card_brand"],
            Self::Transactions => &[
                "client_id",
                "card_id",
                "merchant_city",
                "merchant_state",
                "amount",
                "date",
                "mcc",
            ],
        }
    }

    /// Search engine field mapping
    pub fn search_mapping(&self) -> Value {
        let properties = match self {
            Self::Users => json!({
                "id": { "type": "keyword" },
                "current_age": { "type": "integer" },
                "retirement_age": { "type": "integer" },
                "birth_year": { "type": "integer" },
                "birth_month": { "type": "integer" },
                "gender": { "type": "keyword" },
                "address": { "type": "text" },
                "latitude": { "type": "float" },
                "longitude": { "type": "float" },
                "per_capita_income": { "type": "float" }
            }),
            Self::Cards => json!({
                "id": { "type": "keyword" },
                "client_id": { "type": "keyword" },
                "card_brand": { "type": "keyword" },
                "card_type": { "type": "keyword" },
                "card_number": { "type": "keyword" },
                "expires": { "type": "keyword" },
                "cvv": { "type": "keyword" },
                "has_chip": { "type": "boolean" },
                "num_cards": { "type": "integer" },
                "credit_limit": { "type": "float" }
            }),
            Self::Transactions => json!({
                "id": { "type": "keyword" },
                "date": { "type": "date" },
                "client_id": { "type": "keyword" },
                "card_id": { "type": "keyword" },
                "amount": { "type": "float" },
                "use_chip": { "type": "boolean" },
                "merchant_id": { "type": "keyword" },
                "merchant_city": { "type": "keyword" },
                "merchant_state": { "type": "keyword" },
                "zip": { "type": "keyword" },
                "mcc": { "type": "keyword" }
            }),
        };

        json!({ "mappings": { "properties": properties } })
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_order_is_users_cards_transactions() {
        assert_eq!(
            Entity::ALL,
            [Entity::Users, Entity::Cards, Entity::Transactions]
        );
        assert!(Entity::Users < Entity::Transactions);
    }

    #[test]
    fn mapping_covers_amount_as_float() {
        let mapping = Entity::Transactions.search_mapping();
        assert_eq!(
            mapping["mappings"]["properties"]["amount"]["type"],
            "float"
        );
        assert_eq!(mapping["mappings"]["properties"]["date"]["type"], "date");
    }

    #[test]
    fn every_index_field_is_mapped() {
        for entity in Entity::ALL {
            let mapping = entity.search_mapping();
            for field in entity.index_fields() {
                assert!(
                    !mapping["mappings"]["properties"][*field].is_null(),
                    "{entity}.{field} missing from mapping"
                );
            }
        }
    }
}
