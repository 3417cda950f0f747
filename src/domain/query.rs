use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Rows returned by the listing queries
pub const PAGE_SIZE: u64 = 100;

/// Inclusive amount bounds used by [`QueryShape::AmountRange`]
pub const AMOUNT_RANGE: (f64, f64) = (100.0, 500.0);

/// Merchant city prefix used by [`QueryShape::MerchantCityPrefix`]
pub const CITY_PREFIX: &str = "San";

/// A benchmark query, answered identically by both databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryShape {
    /// First page of transactions
    AllTransactions,
    /// Sum and count of every transaction amount
    SumAmounts,
    /// The single transaction with the highest amount
    LargestTransaction,
    /// A page of transactions with amount inside [`AMOUNT_RANGE`]
    AmountRange,
    /// A page of transactions whose merchant city starts with [`CITY_PREFIX`]
    MerchantCityPrefix,
}

impl QueryShape {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AllTransactions => "Get all transactions",
            Self::SumAmounts => "Calculate sum of all transactions",
            Self::LargestTransaction => "Find largest transaction",
            Self::AmountRange => "Filter transactions by amount range",
            Self::MerchantCityPrefix => "Match merchant city pattern",
        }
    }
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which query shapes a benchmark cycles through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryRotation {
    #[default]
    Basic,
    Extended,
}

impl QueryRotation {
    pub fn shapes(&self) -> &'static [QueryShape] {
        match self {
            Self::Basic => &[
                QueryShape::AllTransactions,
                QueryShape::SumAmounts,
                QueryShape::LargestTransaction,
            ],
            Self::Extended => &[
                QueryShape::AllTransactions,
                QueryShape::SumAmounts,
                QueryShape::LargestTransaction,
                QueryShape::AmountRange,
                QueryShape::MerchantCityPrefix,
            ],
        }
    }

    /// Shape for the zero-based operation index `i`
    pub fn shape_for(&self, i: usize) -> QueryShape {
        let shapes = self.shapes();
        shapes[i % shapes.len()]
    }
}

impl fmt::Display for QueryRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::Extended => f.write_str("extended"),
        }
    }
}

impl FromStr for QueryRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "extended" => Ok(Self::Extended),
            other => Err(format!("unknown rotation `{other}` (expected basic or extended)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_rotation_cycles_three_shapes() {
        let rotation = QueryRotation::Basic;
        let labels: Vec<_> = (0..6).map(|i| rotation.shape_for(i).label()).collect();
        assert_eq!(
            labels,
            vec![
                "Get all transactions",
                "Calculate sum of all transactions",
                "Find largest transaction",
                "Get all transactions",
                "Calculate sum of all transactions",
                "Find largest transaction",
            ]
        );
    }

    #[test]
    fn extended_rotation_has_five_shapes() {
        let rotation = QueryRotation::Extended;
        assert_eq!(rotation.shapes().len(), 5);
        assert_eq!(rotation.shape_for(4), QueryShape::MerchantCityPrefix);
        assert_eq!(rotation.shape_for(5), QueryShape::AllTransactions);
    }

    #[test]
    fn rotation_from_str() {
        assert_eq!("Extended".parse::<QueryRotation>(), Ok(QueryRotation::Extended));
        assert!("random".parse::<QueryRotation>().is_err());
    }
}
