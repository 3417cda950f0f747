//! Field coercion rules shared by every row transformer.
//!
//! Numeric fields never fail: anything unparseable becomes zero. Boolean
//! fields are matched against the truthy tokens of the producing dialect.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

/// Source format of a CSV export
///
/// Different producers of the same dataset spell booleans differently and
/// name the issued-cards column differently. The dialects are kept apart
/// on purpose so each path reads its data the way it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowDialect {
    /// Bulk loader exports
    #[default]
    Loader,
    /// Exports produced through the service API
    Service,
}

impl RowDialect {
    /// Tokens accepted as `true` for a card's `has_chip` column
    pub fn has_chip_tokens(&self) -> &'static [&'static str] {
        match self {
            Self::Loader => &["YES", "TRUE"],
            Self::Service => &["TRUE", "true", "1"],
        }
    }

    /// Tokens accepted as `true` for a transaction's `use_chip` column
    pub fn use_chip_tokens(&self) -> &'static [&'static str] {
        match self {
            Self::Loader => &["Chip Transaction"],
            Self::Service => &["Chip Transaction", "true"],
        }
    }
}

impl fmt::Display for RowDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loader => f.write_str("loader"),
            Self::Service => f.write_str("service"),
        }
    }
}

impl FromStr for RowDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loader" => Ok(Self::Loader),
            "service" => Ok(Self::Service),
            other => Err(format!("unknown row dialect: {other}")),
        }
    }
}

/// Exact token match, no case folding or trimming
pub fn is_truthy(value: Option<&str>, tokens: &[&str]) -> bool {
    value.is_some_and(|v| tokens.contains(&v))
}

/// Leading-integer parse: "42" → 42, "12.7" → 12, "7 years" → 7, "abc" → 0
pub fn parse_int(value: Option<&str>) -> i64 {
    let Some(s) = value.map(str::trim) else {
        return 0;
    };

    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<i64>() {
        Ok(n) if negative => -n,
        Ok(n) => n,
        Err(_) => 0,
    }
}

/// Float parse that fails closed to zero (NaN and infinities included)
pub fn parse_float(value: Option<&str>) -> f64 {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .unwrap_or(0.0)
}

/// Currency parse: strips `$` and `,` before the float parse
pub fn parse_currency(value: Option<&str>) -> f64 {
    let cleaned = value.map(|s| s.replace(['$', ','], ""));
    parse_float(cleaned.as_deref())
}

/// Owned string with blank fallback
pub fn text(value: Option<String>) -> String {
    value.unwrap_or_default()
}

/// Timestamp parse for the transaction `date` column
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
