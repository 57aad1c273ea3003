//! # Token Amounts
//!
//! Non-negative arbitrary-precision integers. Amounts can exceed 64 bits,
//! so every arithmetic path goes through [`TokenAmount`] instead of machine
//! integers. Canonical JSON carries amounts as plain integer tokens; inputs
//! may also provide decimal strings, which are parsed before any arithmetic.

use num_bigint::BigUint;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A non-negative arbitrary-precision token amount.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(BigUint);

impl TokenAmount {
    /// Zero.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    /// Build from a machine integer.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    /// Parse a decimal digit string.
    ///
    /// # Errors
    ///
    /// Returns `None` for anything that is not a plain base-10 integer
    /// (signs, fractions, and exponents included).
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        BigUint::from_str(s).ok().map(Self)
    }

    /// True if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::default()
    }

    /// Checked addition. Cannot overflow, provided for symmetry with
    /// subtraction at call sites.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Self {
        Self(&self.0 + &other.0)
    }

    /// Checked subtraction; `None` if the result would be negative.
    #[must_use]
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        if self.0 < other.0 {
            None
        } else {
            Some(Self(&self.0 - &other.0))
        }
    }

    /// Checked multiplication by a unit count.
    #[must_use]
    pub fn checked_mul_units(&self, units: u64) -> Self {
        Self(&self.0 * BigUint::from(units))
    }

    /// Decimal string form.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    /// Amounts serialize as JSON integer tokens, never strings or floats.
    /// `serde_json` runs with `arbitrary_precision`, so values above 2^64
    /// survive the trip losslessly.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let number: serde_json::Number = serde_json::from_str(&self.0.to_string())
            .map_err(|_| serde::ser::Error::custom("amount is not a valid integer token"))?;
        number.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    /// Accepts JSON integers and decimal strings; rejects floats, exponent
    /// forms, and negatives.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let token = match &value {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            other => {
                return Err(D::Error::custom(format!(
                    "amount must be an integer or decimal string, got {other}"
                )))
            }
        };
        TokenAmount::parse(&token)
            .ok_or_else(|| D::Error::custom(format!("invalid token amount: {token}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let amount = TokenAmount::parse("1208925819614629174706176").unwrap();
        assert_eq!(amount.to_decimal_string(), "1208925819614629174706176");
    }

    #[test]
    fn test_parse_rejects_non_integers() {
        assert!(TokenAmount::parse("-5").is_none());
        assert!(TokenAmount::parse("1.5").is_none());
        assert!(TokenAmount::parse("1e10").is_none());
        assert!(TokenAmount::parse("").is_none());
        assert!(TokenAmount::parse(" 42").is_none());
    }

    #[test]
    fn test_checked_sub_underflow() {
        let a = TokenAmount::from_u64(400);
        let b = TokenAmount::from_u64(401);
        assert!(a.checked_sub(&b).is_none());
        assert_eq!(b.checked_sub(&a).unwrap(), TokenAmount::from_u64(1));
    }

    #[test]
    fn test_serde_integer_roundtrip() {
        let amount = TokenAmount::parse("340282366920938463463374607431768211456").unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        // No quotes: the wire form is an integer token
        assert_eq!(json, "340282366920938463463374607431768211456");

        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_deserialize_from_decimal_string() {
        let amount: TokenAmount = serde_json::from_str(r#""12345""#).unwrap();
        assert_eq!(amount, TokenAmount::from_u64(12345));
    }

    #[test]
    fn test_deserialize_rejects_float() {
        assert!(serde_json::from_str::<TokenAmount>("1.25").is_err());
        assert!(serde_json::from_str::<TokenAmount>("-3").is_err());
    }

    #[test]
    fn test_mul_units() {
        let price = TokenAmount::from_u64(7);
        assert_eq!(price.checked_mul_units(6), TokenAmount::from_u64(42));
    }
}
