//! Arbitrary-precision chain quantities.
//!
//! Every integer-valued blockchain quantity crosses the wire as a decimal
//! string. On input a JSON number, a decimal string or a `0x`-prefixed hex
//! string are all accepted, so a value renders to the same bytes no matter
//! how the producer happened to encode it.

use alloy_primitives::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing a [`Quantity`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("negative quantity: {0}")]
    Negative(String),
    #[error("invalid quantity {input:?}: {reason}")]
    Invalid { input: String, reason: String },
}

/// An unsigned 256-bit chain quantity rendered as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Quantity(pub U256);

impl Quantity {
    pub const ZERO: Self = Self(U256::ZERO);

    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<U256> for Quantity {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<Quantity> for U256 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl From<u64> for Quantity {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u16> for Quantity {
    fn from(value: u16) -> Self {
        Self(U256::from(value))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `U256`'s Display is base 10.
        write!(f, "{}", self.0)
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(QuantityError::Negative(trimmed.to_owned()));
        }
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some("") => return Err(QuantityError::Empty),
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(trimmed, 10),
        };
        parsed.map(Self).map_err(|e| QuantityError::Invalid {
            input: trimmed.to_owned(),
            reason: e.to_string(),
        })
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuantityVisitor;

        impl Visitor<'_> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer, decimal string or 0x-prefixed hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
                Ok(Quantity::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
                u64::try_from(v)
                    .map(Quantity::from)
                    .map_err(|_| E::custom(QuantityError::Negative(v.to_string())))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Quantity, E> {
                Ok(Quantity(U256::from(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}

/// Serde adapter rendering a `u64` as a decimal string on the wire while
/// still accepting a plain JSON number on input.
///
/// ```ignore
/// #[serde(with = "arena_sdk::quantity::u64_string")]
/// pub block_number: u64,
/// ```
pub mod u64_string {
    use super::Quantity;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let quantity = Quantity::deserialize(deserializer)?;
        u64::try_from(quantity.0).map_err(|_| de::Error::custom("quantity does not fit in u64"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_decimal_string() {
        let q = Quantity::from(1_000_000u64);
        assert_eq!(serde_json::to_value(q).unwrap(), json!("1000000"));

        let max = Quantity(U256::MAX);
        assert_eq!(
            serde_json::to_string(&max).unwrap(),
            format!("\"{}\"", U256::MAX)
        );
    }

    #[test]
    fn accepts_number_decimal_and_hex() {
        let from_number: Quantity = serde_json::from_value(json!(250000)).unwrap();
        let from_decimal: Quantity = serde_json::from_value(json!("250000")).unwrap();
        let from_hex: Quantity = serde_json::from_value(json!("0x3d090")).unwrap();
        assert_eq!(from_number, from_decimal);
        assert_eq!(from_decimal, from_hex);
    }

    #[test]
    fn accepts_values_beyond_u64() {
        let big = "340282366920938463463374607431768211456"; // 2^128
        let q: Quantity = serde_json::from_value(json!(big)).unwrap();
        assert_eq!(q.to_string(), big);
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(serde_json::from_value::<Quantity>(json!(-1)).is_err());
        assert!(serde_json::from_value::<Quantity>(json!("-5")).is_err());
        assert!(serde_json::from_value::<Quantity>(json!("12abc")).is_err());
        assert!(serde_json::from_value::<Quantity>(json!("")).is_err());
        assert!(serde_json::from_value::<Quantity>(json!("0x")).is_err());
    }

    #[test]
    fn u64_string_adapter() {
        #[derive(Serialize, Deserialize)]
        struct Block {
            #[serde(with = "u64_string")]
            number: u64,
        }

        let parsed: Block = serde_json::from_value(json!({ "number": 101 })).unwrap();
        assert_eq!(parsed.number, 101);
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!({ "number": "101" })
        );
    }
}
