use std::fmt;

use serde::{Serialize, Serializer};

use super::error::DomainError;

/// Fixed-point decimal representation using i64 (multiply by 10,000)
/// Represents transaction amounts with 4 decimal places of precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 10_000;
    const PRECISION: usize = 4;

    /// Create from raw scaled value
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Zero value
    pub fn zero() -> Self {
        Self(0)
    }

    /// Parse a plain decimal string (e.g., "-77.50" or "1.5e3")
    pub fn from_decimal_str(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();

        let (is_negative, s) = if let Some(stripped) = s.strip_prefix('-') {
            (true, stripped)
        } else {
            (false, s.strip_prefix('+').unwrap_or(s))
        };

        let (mantissa, exponent) = match s.split_once(['e', 'E']) {
            Some((mantissa, exp)) => (
                mantissa,
                exp.parse::<i32>().map_err(|_| DomainError::InvalidAmount)?,
            ),
            None => (s, 0),
        };

        let (integer_part, decimal_part) = match mantissa.split_once('.') {
            Some((int, dec)) => (int, dec),
            None => (mantissa, ""),
        };

        if integer_part.is_empty() && decimal_part.is_empty() {
            return Err(DomainError::InvalidAmount);
        }
        if !integer_part.bytes().all(|b| b.is_ascii_digit())
            || !decimal_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(DomainError::InvalidAmount);
        }

        let (integer_part, decimal_part) = shift_point(integer_part, decimal_part, exponent)?;
        let integer_part = integer_part.trim_start_matches('0');

        let integer: i64 = if integer_part.is_empty() {
            0
        } else {
            integer_part.parse().map_err(|_| DomainError::Overflow)?
        };

        // Digits past the fourth decimal place are truncated
        let decimal_digits = &decimal_part[..decimal_part.len().min(Self::PRECISION)];
        let decimal: i64 = format!("{:0<4}", decimal_digits)
            .parse()
            .map_err(|_| DomainError::InvalidAmount)?;

        let scaled = integer
            .checked_mul(Self::SCALE)
            .and_then(|v| v.checked_add(decimal))
            .ok_or(DomainError::Overflow)?;

        Ok(Self(if is_negative { -scaled } else { scaled }))
    }

    /// Parse a currency-formatted string such as "$1,234.56" or "$-77.00"
    ///
    /// Dollar signs and thousands separators are stripped before parsing.
    pub fn from_currency_str(s: &str) -> Result<Self, DomainError> {
        let cleaned: String = s.chars().filter(|c| !matches!(c, '$' | ',')).collect();
        Self::from_decimal_str(&cleaned)
    }

    /// Currency parse that fails closed to zero
    pub fn from_currency_or_zero(s: &str) -> Self {
        Self::from_currency_str(s).unwrap_or_default()
    }

    /// Lossy conversion for stores that index amounts as floats
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }
}

/// Move the decimal point of `integer.decimal` by `exponent` places
fn shift_point(
    integer: &str,
    decimal: &str,
    exponent: i32,
) -> Result<(String, String), DomainError> {
    const MAX_SHIFT: i32 = 32;

    if exponent > MAX_SHIFT {
        return Err(DomainError::Overflow);
    }
    if exponent < -MAX_SHIFT {
        return Ok((String::new(), String::new()));
    }

    let digits = format!("{integer}{decimal}");
    let point = integer.len() as i32 + exponent;
    Ok(if point <= 0 {
        (String::new(), "0".repeat(point.unsigned_abs() as usize) + &digits)
    } else if point as usize >= digits.len() {
        let padding = "0".repeat(point as usize - digits.len());
        (digits + &padding, String::new())
    } else {
        let (int, dec) = digits.split_at(point as usize);
        (int.to_string(), dec.to_string())
    })
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs_value = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:04}", sign, abs_value / scale, abs_value % scale)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}
