use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::error::IoError;
use crate::domain::coerce::{
    is_truthy, parse_currency, parse_float, parse_int, parse_timestamp, text,
};
use crate::domain::{Amount, CardRecord, Record, RowDialect, TransactionRecord, UserRecord};

/// A raw CSV row that maps to exactly one record
///
/// Parsing is pure: it never touches a destination and is safe to call
/// from any task.
pub trait RawRow: DeserializeOwned + Send + 'static {
    type Output: Record;

    /// Coerce the row into a typed record, or reject it as a whole
    fn parse(self, dialect: RowDialect) -> Result<Self::Output, IoError>;
}

/// The only per-row rejection: rows without an identity are skipped
fn require_id(id: Option<String>) -> Result<String, IoError> {
    match id {
        Some(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => Err(IoError::MissingField("id".to_string())),
    }
}

/// Raw users CSV row as read from input
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawUserRow {
    pub id: Option<String>,
    pub current_age: Option<String>,
    pub retirement_age: Option<String>,
    pub birth_year: Option<String>,
    pub birth_month: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub per_capita_income: Option<String>,
}

impl RawRow for RawUserRow {
    type Output = UserRecord;

    fn parse(self, _dialect: RowDialect) -> Result<UserRecord, IoError> {
        Ok(UserRecord {
            id: require_id(self.id)?,
            current_age: parse_int(self.current_age.as_deref()),
            retirement_age: parse_int(self.retirement_age.as_deref()),
            birth_year: parse_int(self.birth_year.as_deref()),
            birth_month: parse_int(self.birth_month.as_deref()),
            gender: text(self.gender),
            address: text(self.address),
            latitude: parse_float(self.latitude.as_deref()),
            longitude: parse_float(self.longitude.as_deref()),
            per_capita_income: parse_currency(self.per_capita_income.as_deref()),
        })
    }
}

/// Raw cards CSV row as read from input
///
/// Both issued-card column spellings are captured; the dialect decides
/// which one is read.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCardRow {
    pub id: Option<String>,
    pub client_id: Option<String>,
    pub card_brand: Option<String>,
    pub card_type: Option<String>,
    pub card_number: Option<String>,
    pub expires: Option<String>,
    pub cvv: Option<String>,
    pub has_chip: Option<String>,
    pub num_cards_issued: Option<String>,
    pub num_cards: Option<String>,
    pub credit_limit: Option<String>,
}

impl RawRow for RawCardRow {
    type Output = CardRecord;

    fn parse(self, dialect: RowDialect) -> Result<CardRecord, IoError> {
        let issued = match dialect {
            RowDialect::Loader => self.num_cards_issued.as_deref(),
            RowDialect::Service => self.num_cards.as_deref(),
        };

        Ok(CardRecord {
            id: require_id(self.id)?,
            num_cards: parse_int(issued),
            has_chip: is_truthy(self.has_chip.as_deref(), dialect.has_chip_tokens()),
            credit_limit: parse_currency(self.credit_limit.as_deref()),
            client_id: text(self.client_id),
            card_brand: text(self.card_brand),
            card_type: text(self.card_type),
            card_number: text(self.card_number),
            expires: text(self.expires),
            cvv: text(self.cvv),
        })
    }
}

/// Raw transactions CSV row as read from input
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawTransactionRow {
    pub id: Option<String>,
    pub date: Option<String>,
    pub client_id: Option<String>,
    pub card_id: Option<String>,
    pub amount: Option<String>,
    pub use_chip: Option<String>,
    pub merchant_id: Option<String>,
    pub merchant_city: Option<String>,
    pub merchant_state: Option<String>,
    pub zip: Option<String>,
    pub mcc: Option<String>,
}

impl RawRow for RawTransactionRow {
    type Output = TransactionRecord;

    fn parse(self, dialect: RowDialect) -> Result<TransactionRecord, IoError> {
        Ok(TransactionRecord {
            id: require_id(self.id)?,
            date: parse_timestamp(self.date.as_deref()),
            amount: self
                .amount
                .as_deref()
                .map(Amount::from_currency_or_zero)
                .unwrap_or_default(),
            use_chip: is_truthy(self.use_chip.as_deref(), dialect.use_chip_tokens()),
            client_id: text(self.client_id),
            card_id: text(self.card_id),
            merchant_id: text(self.merchant_id),
            merchant_city: text(self.merchant_city),
            merchant_state: text(self.merchant_state),
            zip: text(self.zip),
            mcc: text(self.mcc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_user(id: &str, age: &str) -> RawUserRow {
        RawUserRow {
            id: Some(id.to_string()),
            current_age: Some(age.to_string()),
            retirement_age: Some("66".to_string()),
            birth_year: Some("1966".to_string()),
            birth_month: Some("11".to_string()),
            gender: Some("Female".to_string()),
            address: Some("462 Rose Lane".to_string()),
            latitude: Some("34.15".to_string()),
            longitude: Some("-117.76".to_string()),
            per_capita_income: Some("$29,278".to_string()),
        }
    }

    #[test]
    fn parse_user() {
        let user = raw_user("825", "53").parse(RowDialect::Loader).unwrap();
        assert_eq!(user.id, "825");
        assert_eq!(user.current_age, 53);
        assert_eq!(user.birth_year, 1966);
        assert_eq!(user.latitude, 34.15);
        assert_eq!(user.per_capita_income, 29278.0);
    }

    #[test]
    fn unparseable_numbers_become_zero() {
        let mut raw = raw_user("1", "fifty");
        raw.latitude = Some("north".to_string());
        raw.per_capita_income = None;

        let user = raw.parse(RowDialect::Loader).unwrap();
        assert_eq!(user.current_age, 0);
        assert_eq!(user.latitude, 0.0);
        assert_eq!(user.per_capita_income, 0.0);
    }

    #[test]
    fn missing_fields_default_to_blank() {
        let raw = RawUserRow {
            id: Some("9".to_string()),
            ..Default::default()
        };

        let user = raw.parse(RowDialect::Service).unwrap();
        assert_eq!(user.gender, "");
        assert_eq!(user.retirement_age, 0);
    }

    #[test]
    fn rows_without_id_are_rejected() {
        let blank = raw_user("   ", "40").parse(RowDialect::Loader);
        assert!(matches!(blank, Err(IoError::MissingField(_))));

        let missing = RawTransactionRow::default().parse(RowDialect::Loader);
        assert!(matches!(missing, Err(IoError::MissingField(_))));
    }

    #[test]
    fn card_dialects_read_different_columns_and_tokens() {
        let raw = || RawCardRow {
            id: Some("4524".to_string()),
            client_id: Some("825".to_string()),
            card_brand: Some("Visa".to_string()),
            has_chip: Some("YES".to_string()),
            num_cards_issued: Some("2".to_string()),
            num_cards: Some("5".to_string()),
            credit_limit: Some("$24,295".to_string()),
            ..Default::default()
        };

        let loader = raw().parse(RowDialect::Loader).unwrap();
        assert!(loader.has_chip);
        assert_eq!(loader.num_cards, 2);
        assert_eq!(loader.credit_limit, 24295.0);

        let service = raw().parse(RowDialect::Service).unwrap();
        assert!(!service.has_chip);
        assert_eq!(service.num_cards, 5);
    }

    #[test]
    fn parse_transaction() {
        let raw = RawTransactionRow {
            id: Some("7475327".to_string()),
            date: Some("2010-01-01 00:01:00".to_string()),
            client_id: Some("1556".to_string()),
            card_id: Some("2972".to_string()),
            amount: Some("$-77.00".to_string()),
            use_chip: Some("Swipe Transaction".to_string()),
            merchant_id: Some("59935".to_string()),
            merchant_city: Some("Beulah".to_string()),
            merchant_state: Some("ND".to_string()),
            zip: Some("58523.0".to_string()),
            mcc: Some("5499".to_string()),
        };

        let tx = raw.parse(RowDialect::Loader).unwrap();
        assert_eq!(tx.amount, Amount::from_raw(-770_000));
        assert!(!tx.use_chip);
        assert!(tx.date.is_some());
        assert_eq!(tx.zip, "58523.0");
    }

    #[test]
    fn transaction_chip_tokens_follow_dialect() {
        let raw = |token: &str| RawTransactionRow {
            id: Some("1".to_string()),
            use_chip: Some(token.to_string()),
            ..Default::default()
        };

        assert!(raw("Chip Transaction").parse(RowDialect::Loader).unwrap().use_chip);
        assert!(!raw("true").parse(RowDialect::Loader).unwrap().use_chip);
        assert!(raw("true").parse(RowDialect::Service).unwrap().use_chip);
    }

    #[test]
    fn bad_amount_fails_closed() {
        let raw = RawTransactionRow {
            id: Some("1".to_string()),
            amount: Some("$abc".to_string()),
            ..Default::default()
        };

        let tx = raw.parse(RowDialect::Loader).unwrap();
        assert_eq!(tx.amount, Amount::zero());
    }
}
