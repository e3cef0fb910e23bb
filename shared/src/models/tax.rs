//! Allowed tax rates

use crate::error::{AppError, ErrorCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tax rate, one of the allowed VAT percentages
///
/// Serialized as its percentage number (`5.5`, `10`, `20`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub enum TaxRate {
    /// 5.5%: food and basic goods
    #[default]
    Reduced,
    /// 10%: restaurant and prepared meals
    Intermediate,
    /// 20%: non-food goods
    Standard,
}

impl TaxRate {
    pub const ALL: [TaxRate; 3] = [TaxRate::Reduced, TaxRate::Intermediate, TaxRate::Standard];

    /// Rate as a percentage (e.g. `5.5`)
    pub fn percent(&self) -> Decimal {
        match self {
            TaxRate::Reduced => Decimal::new(55, 1),
            TaxRate::Intermediate => Decimal::from(10),
            TaxRate::Standard => Decimal::from(20),
        }
    }

    pub fn from_percent(percent: Decimal) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.percent() == percent)
    }
}

impl TryFrom<Decimal> for TaxRate {
    type Error = AppError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_percent(value).ok_or_else(|| {
            AppError::new(ErrorCode::InvalidTaxRate).with_detail("tax_rate", value.to_string())
        })
    }
}

impl From<TaxRate> for Decimal {
    fn from(value: TaxRate) -> Self {
        value.percent()
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}
