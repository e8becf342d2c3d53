use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const ELURC_CURRENCY_CODE: &str = "ELURC";
pub const EUR_CURRENCY_CODE: &str = "EUR";
pub const LAMPORTS_PER_ELURC: i64 = 1_000_000;

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount: {0}")]
pub struct AmountConversionError(String);

//--------------------------------------      Lamports       ---------------------------------------------------------
/// An ELURC amount, expressed in lamports. 1 ELURC = 1,000,000 lamports.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Lamports(i64);

op!(binary Lamports, Add, add);
op!(binary Lamports, Sub, sub);
op!(inplace Lamports, SubAssign, sub_assign);
op!(unary Lamports, Neg, neg);

impl Mul<i64> for Lamports {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Lamports {
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }
}

impl Sum for Lamports {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for Lamports {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Lamports {
    type Error = AmountConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(AmountConversionError(format!("{value} is too large to convert to lamports")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Lamports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = LAMPORTS_PER_ELURC as u64;
        write!(f, "{sign}{}.{:06} {ELURC_CURRENCY_CODE}", abs / per, abs % per)
    }
}

/// Parses a decimal ELURC amount, e.g. `"12.5"` or `"0.000001"`. At most six decimal places are accepted.
impl FromStr for Lamports {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountConversionError(format!("'{s}' is not an ELURC amount")));
        }
        if frac.len() > 6 {
            return Err(AmountConversionError(format!("'{s}' has more than 6 decimal places")));
        }
        let parse = |part: &str| -> Result<i64, AmountConversionError> {
            if part.is_empty() {
                return Ok(0);
            }
            if !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(AmountConversionError(format!("'{s}' is not an ELURC amount")));
            }
            part.parse::<i64>().map_err(|e| AmountConversionError(format!("'{s}': {e}")))
        };
        let whole = parse(whole)?;
        let frac = parse(&format!("{frac:0<6}"))?;
        let value = whole
            .checked_mul(LAMPORTS_PER_ELURC)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| AmountConversionError(format!("'{s}' overflows")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Lamports {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_elurc(elurc: i64) -> Self {
        Self(elurc * LAMPORTS_PER_ELURC)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }
}

//--------------------------------------      EuroCents      ---------------------------------------------------------
/// A reference price in euro cents. Orders are paid in ELURC; the euro value is informational.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct EuroCents(i64);

op!(binary EuroCents, Add, add);
op!(binary EuroCents, Sub, sub);

impl Mul<i64> for EuroCents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl EuroCents {
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }
}

impl Sum for EuroCents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for EuroCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for EuroCents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}€{}.{:02}", abs / 100, abs % 100)
    }
}

impl EuroCents {
    pub fn value(&self) -> i64 {
        self.0
    }
}
