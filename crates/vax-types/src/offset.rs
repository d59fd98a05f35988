//! Calendar offsets used by dosing policies.
//!
//! An [`Offset`] is written as `<amount> <unit>` (for example `11 months`, `1 week`,
//! `10 years`). Month and year arithmetic clamps to the last day of the target month, so
//! `2024-01-31 + 1 month` is `2024-02-29`.

use chrono::{Days, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Errors returned when parsing an offset.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OffsetError {
    #[error("offset must be '<amount> <unit>', got: '{0}'")]
    Malformed(String),
    #[error("invalid offset amount: '{0}'")]
    InvalidAmount(String),
    #[error("unknown offset unit '{0}' (expected days, weeks, months or years)")]
    UnknownUnit(String),
}

/// Calendar unit of an [`Offset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OffsetUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl OffsetUnit {
    fn label(self, amount: u32) -> &'static str {
        match (self, amount == 1) {
            (OffsetUnit::Days, true) => "day",
            (OffsetUnit::Days, false) => "days",
            (OffsetUnit::Weeks, true) => "week",
            (OffsetUnit::Weeks, false) => "weeks",
            (OffsetUnit::Months, true) => "month",
            (OffsetUnit::Months, false) => "months",
            (OffsetUnit::Years, true) => "year",
            (OffsetUnit::Years, false) => "years",
        }
    }
}

impl FromStr for OffsetUnit {
    type Err = OffsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "days" => Ok(OffsetUnit::Days),
            "week" | "weeks" => Ok(OffsetUnit::Weeks),
            "month" | "months" => Ok(OffsetUnit::Months),
            "year" | "years" => Ok(OffsetUnit::Years),
            _ => Err(OffsetError::UnknownUnit(s.to_owned())),
        }
    }
}

/// A non-negative calendar offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Offset {
    amount: u32,
    unit: OffsetUnit,
}

impl Offset {
    pub const fn new(amount: u32, unit: OffsetUnit) -> Self {
        Self { amount, unit }
    }

    pub const fn days(amount: u32) -> Self {
        Self::new(amount, OffsetUnit::Days)
    }

    pub const fn weeks(amount: u32) -> Self {
        Self::new(amount, OffsetUnit::Weeks)
    }

    pub const fn months(amount: u32) -> Self {
        Self::new(amount, OffsetUnit::Months)
    }

    pub const fn years(amount: u32) -> Self {
        Self::new(amount, OffsetUnit::Years)
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn unit(&self) -> OffsetUnit {
        self.unit
    }

    /// Adds this offset to `date`.
    ///
    /// Returns `None` if the result falls outside the representable calendar range.
    pub fn add_to(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self.unit {
            OffsetUnit::Days => date.checked_add_days(Days::new(u64::from(self.amount))),
            OffsetUnit::Weeks => {
                date.checked_add_days(Days::new(u64::from(self.amount).checked_mul(7)?))
            }
            OffsetUnit::Months => date.checked_add_months(Months::new(self.amount)),
            OffsetUnit::Years => date.checked_add_months(Months::new(self.amount.checked_mul(12)?)),
        }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit.label(self.amount))
    }
}

impl FromStr for Offset {
    type Err = OffsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(OffsetError::Malformed(s.to_owned()));
        };
        let amount = amount
            .parse::<u32>()
            .map_err(|_| OffsetError::InvalidAmount(amount.to_owned()))?;
        Ok(Self::new(amount, unit.parse()?))
    }
}

impl serde::Serialize for Offset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Offset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
