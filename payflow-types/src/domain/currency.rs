//! Validated ISO 4217 currency code.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// ISO 4217 codes the system commonly processes. Codes outside this set are
/// accepted (the list is advisory, not exhaustive); callers may log them.
const COMMON_CODES: [&str; 20] = [
    "USD", "EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "CNY", "HKD", "NZD", "SEK", "KRW", "SGD",
    "NOK", "MXN", "INR", "RUB", "ZAR", "TRY", "BRL",
];

/// A 3-letter currency code, uppercase-normalized at construction.
///
/// Amounts are always carried separately in integer minor units; this type
/// only names the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Parses and normalizes a currency code.
    ///
    /// # Validation
    /// - Exactly 3 characters after trimming
    /// - Alphabetic only; lowercase input is uppercased
    pub fn parse(code: &str) -> Result<Self, DomainError> {
        let trimmed = code.trim();
        if trimmed.len() != 3 {
            return Err(DomainError::Validation {
                field: "currency".into(),
                message: "currency code must be 3 characters".into(),
            });
        }
        if !trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(DomainError::Validation {
                field: "currency".into(),
                message: "currency code must be alphabetic".into(),
            });
        }
        let bytes = trimmed.as_bytes();
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    /// Returns the normalized code.
    pub fn as_str(&self) -> &str {
        // Bytes are validated ASCII uppercase at construction.
        std::str::from_utf8(&self.0).expect("currency bytes are ASCII")
    }

    /// True when the code belongs to the common ISO 4217 subset.
    pub fn is_common(&self) -> bool {
        COMMON_CODES.contains(&self.as_str())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let currency = Currency::parse("usd").unwrap();
        assert_eq!(currency.as_str(), "USD");
        assert!(currency.is_common());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let currency = Currency::parse(" eur ").unwrap();
        assert_eq!(currency.as_str(), "EUR");
    }

    #[test]
    fn test_wrong_length_fails() {
        assert!(matches!(
            Currency::parse("USDD"),
            Err(DomainError::Validation { .. })
        ));
        assert!(matches!(
            Currency::parse(""),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_non_alphabetic_fails() {
        assert!(matches!(
            Currency::parse("U5D"),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn test_uncommon_code_allowed() {
        let currency = Currency::parse("XTS").unwrap();
        assert!(!currency.is_common());
    }

    #[test]
    fn test_serde_round_trip() {
        let currency = Currency::parse("gbp").unwrap();
        let json = serde_json::to_string(&currency).unwrap();
        assert_eq!(json, "\"GBP\"");
        let back: Currency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, currency);
    }
}
