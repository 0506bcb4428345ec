use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------       Money        ---------------------------------------------------------
/// A currency amount, stored as an integer number of hundredths of the currency unit.
///
/// Bank transfer notifications report amounts as JSON numbers, decimal strings or form values, so `Money` accepts all
/// three when deserializing. Amounts with more than two significant fractional digits are rejected rather than
/// rounded.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct MoneyConversionError(String);

impl Money {
    pub fn from_minor(value: i64) -> Self {
        Self(value)
    }

    pub fn from_major(value: i64) -> Self {
        Self(value * MINOR_UNITS_PER_MAJOR)
    }

    /// The amount in hundredths of the currency unit.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    fn from_f64(value: f64) -> Result<Self, MoneyConversionError> {
        if !value.is_finite() {
            return Err(MoneyConversionError(value.to_string()));
        }
        let minor = value * MINOR_UNITS_PER_MAJOR as f64;
        if minor.abs() > i64::MAX as f64 || (minor - minor.round()).abs() > 1e-6 {
            return Err(MoneyConversionError(value.to_string()));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(minor.round() as i64))
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MoneyConversionError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }
        let frac = frac.trim_end_matches('0');
        if frac.len() > 2 {
            return Err(err());
        }
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let frac = format!("{frac:0<2}").parse::<i64>().map_err(|_| err())?;
        let minor = whole.checked_mul(MINOR_UNITS_PER_MAJOR).and_then(|v| v.checked_add(frac)).ok_or_else(err)?;
        Ok(Self(if negative { -minor } else { minor }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MINOR_UNITS_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / unit, abs % unit)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % MINOR_UNITS_PER_MAJOR == 0 {
            serializer.serialize_i64(self.0 / MINOR_UNITS_PER_MAJOR)
        } else {
            serializer.serialize_f64(self.0 as f64 / MINOR_UNITS_PER_MAJOR as f64)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawAmount::deserialize(deserializer)?;
        let result = match raw {
            RawAmount::Integer(v) => {
                v.checked_mul(MINOR_UNITS_PER_MAJOR).map(Money).ok_or_else(|| MoneyConversionError(v.to_string()))
            },
            RawAmount::Float(v) => Money::from_f64(v),
            RawAmount::Text(s) => s.parse(),
        };
        result.map_err(serde::de::Error::custom)
    }
}
