use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use crate::validation::ValidationError;

/// Hundredths per whole credit.
pub const CREDIT_SCALE: u64 = 100;

// Largest amount whose hundredths count is exactly representable as f64.
const MAX_HUNDREDTHS: u64 = 1 << 53;

/// Non-negative fixed-point credit amount with two decimal places.
///
/// Stored as an integer count of hundredths so sums are exact. On the wire
/// it is a JSON number; in hash input it is [`Credit::to_decimal_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Credit(u64);

impl Credit {
    /// Zero credit.
    pub const ZERO: Credit = Credit(0);

    /// Builds an amount from a count of hundredths.
    pub const fn from_hundredths(hundredths: u64) -> Self {
        Credit(hundredths)
    }

    /// Builds an amount from whole credits.
    pub const fn from_whole(whole: u64) -> Self {
        Credit(whole * CREDIT_SCALE)
    }

    /// Count of hundredths.
    pub const fn hundredths(self) -> u64 {
        self.0
    }

    /// Converts a float, requiring it to be finite, non-negative and on a hundredth.
    ///
    /// The float must be exactly the one [`Credit::to_f64`] would produce, so
    /// two distinct wire numbers never map to the same amount.
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite);
        }
        if value < 0.0 {
            return Err(ValidationError::NegativeAmount(value));
        }
        let scaled = value * CREDIT_SCALE as f64;
        let rounded = scaled.round();
        if rounded >= MAX_HUNDREDTHS as f64 {
            return Err(ValidationError::OutOfBounds {
                field: "credit",
                value: value.to_string(),
            });
        }
        if rounded / CREDIT_SCALE as f64 != value {
            return Err(ValidationError::ExcessPrecision(value));
        }
        Ok(Credit(rounded as u64))
    }

    /// Float form, used for the JSON wire representation only.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / CREDIT_SCALE as f64
    }

    /// Minimal decimal text: `50`, `15.5`, `14.29`.
    ///
    /// This is the only form in which amounts enter the hash input.
    pub fn to_decimal_string(self) -> String {
        let whole = self.0 / CREDIT_SCALE;
        let frac = self.0 % CREDIT_SCALE;
        if frac == 0 {
            whole.to_string()
        } else if frac % 10 == 0 {
            format!("{}.{}", whole, frac / 10)
        } else {
            format!("{}.{:02}", whole, frac)
        }
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Credit) -> Option<Credit> {
        self.0.checked_add(rhs.0).map(Credit)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Credit) -> Option<Credit> {
        self.0.checked_sub(rhs.0).map(Credit)
    }

    /// Splits into `parts` equal shares, returning the share and the remainder.
    pub fn split(self, parts: u64) -> (Credit, Credit) {
        if parts == 0 {
            return (Credit::ZERO, self);
        }
        (Credit(self.0 / parts), Credit(self.0 % parts))
    }
}

impl Add for Credit {
    type Output = Credit;

    fn add(self, rhs: Credit) -> Credit {
        Credit(self.0 + rhs.0)
    }
}

impl AddAssign for Credit {
    fn add_assign(&mut self, rhs: Credit) {
        self.0 += rhs.0;
    }
}

impl Sub for Credit {
    type Output = Credit;

    fn sub(self, rhs: Credit) -> Credit {
        Credit(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Credit {
    fn sum<I: Iterator<Item = Credit>>(iter: I) -> Credit {
        iter.fold(Credit::ZERO, |acc, c| acc + c)
    }
}

impl<'a> Sum<&'a Credit> for Credit {
    fn sum<I: Iterator<Item = &'a Credit>>(iter: I) -> Credit {
        iter.copied().sum()
    }
}

impl fmt::Display for Credit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Serialize for Credit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Credit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Credit::from_f64(raw).map_err(serde::de::Error::custom)
    }
}
