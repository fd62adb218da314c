//! Fixed-point native-asset amounts.
//!
//! The ledger works in stroops (10^-7 of a unit). Amounts are kept as an
//! integer stroop count and rendered with exactly seven decimals, which is
//! the form the ledger reports and accepts.

use bigdecimal::{BigDecimal, Signed, ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DECIMALS: i64 = 7;
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Exponents outside this range cannot fit an i64 stroop count, and
/// rescaling them would allocate enormous integers.
const MAX_EXPONENT: i64 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount must not be empty")]
    Empty,
    #[error("amount must be a decimal number")]
    Malformed,
    #[error("amount must not be negative")]
    Negative,
    #[error("amount has more than 7 fractional digits")]
    TooPrecise,
    #[error("amount is too large")]
    Overflow,
}

/// A non-negative quantity of the native asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_stroops(stroops: i64) -> Self {
        Amount(stroops)
    }

    pub fn stroops(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn to_decimal(&self) -> BigDecimal {
        BigDecimal::new(self.0.into(), DECIMALS)
    }
}

impl TryFrom<&BigDecimal> for Amount {
    type Error = AmountError;

    fn try_from(value: &BigDecimal) -> Result<Self, Self::Error> {
        if value.is_negative() {
            return Err(AmountError::Negative);
        }

        let (_, scale) = value.as_bigint_and_exponent();
        if scale < -MAX_EXPONENT {
            return Err(AmountError::Overflow);
        }
        if scale > MAX_EXPONENT {
            return Err(AmountError::TooPrecise);
        }

        let scaled = value.with_scale(DECIMALS);
        if scaled != *value {
            return Err(AmountError::TooPrecise);
        }

        let (stroops, _) = scaled.as_bigint_and_exponent();
        stroops.to_i64().map(Amount).ok_or(AmountError::Overflow)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AmountError::Empty);
        }

        let value = BigDecimal::from_str(raw).map_err(|_| AmountError::Malformed)?;
        Amount::try_from(&value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
