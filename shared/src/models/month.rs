//! Inventory month token

use crate::error::{AppError, ErrorCode};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Year-month token (`YYYY-MM`) partitioning a stock-taking period
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InventoryMonth(String);

impl InventoryMonth {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::new(ErrorCode::InvalidInventoryMonth).with_detail("month", raw);

        let (year, month) = raw.split_once('-').ok_or_else(invalid)?;
        let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if year.len() != 4 || month.len() != 2 || !digits(year) || !digits(month) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;

        Ok(Self(raw.to_string()))
    }

    /// Month containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Self(format!("{:04}-{:02}", date.year(), date.month()))
    }

    /// Month of the local clock
    pub fn current() -> Self {
        Self::from_date(chrono::Local::now().date_naive())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InventoryMonth {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InventoryMonth> for String {
    fn from(value: InventoryMonth) -> Self {
        value.0
    }
}

impl fmt::Display for InventoryMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(InventoryMonth::parse("2025-12").unwrap().as_str(), "2025-12");
    }

    #[test]
    fn test_parse_invalid() {
        for raw in ["2025-13", "2025-00", "25-12", "2025/12", "2025-1", "2025-+1", "december"] {
            assert!(InventoryMonth::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_from_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 17).unwrap();
        assert_eq!(InventoryMonth::from_date(date).as_str(), "2026-03");
    }
}
