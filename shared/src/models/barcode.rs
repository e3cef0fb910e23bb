//! Barcode value type

use crate::error::{AppError, ErrorCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A numeric barcode (EAN-13, EAN-8, UPC-A, ...)
///
/// Surrounding whitespace is trimmed on parse; the remaining text must be
/// non-empty ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Barcode(String);

impl Barcode {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::new(ErrorCode::InvalidBarcode).with_detail("barcode", raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Barcode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Barcode> for String {
    fn from(value: Barcode) -> Self {
        value.0
    }
}

impl AsRef<str> for Barcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deserialize an optional barcode, treating `null` and `""` as absent
pub(crate) fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<Barcode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => Barcode::parse(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_input() {
        let code = Barcode::parse("  5449000000996\n").unwrap();
        assert_eq!(code.as_str(), "5449000000996");
    }

    #[test]
    fn test_parse_rejects_non_digits() {
        assert!(Barcode::parse("").is_err());
        assert!(Barcode::parse("   ").is_err());
        assert!(Barcode::parse("54490-00").is_err());
        assert!(Barcode::parse("abc").is_err());
    }
}
