//! Shared validators for payment input.
//!
//! Everything here runs before any external call is made; failures map to
//! the `VALIDATION_ERROR` code on the caller-facing surface.

use crate::error::DomainError;

/// Smallest accepted amount in minor units.
pub const MIN_AMOUNT: i64 = 1;
/// Largest accepted amount in minor units (~1M in a 2-decimal currency).
pub const MAX_AMOUNT: i64 = 99_999_999;
/// Longest accepted customer/order reference.
pub const MAX_REFERENCE_LEN: usize = 255;
/// Largest page size a listing will serve.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Validates an amount in minor units.
pub fn validate_amount(amount: i64) -> Result<i64, DomainError> {
    if amount < MIN_AMOUNT {
        return Err(DomainError::Validation {
            field: "amount".into(),
            message: format!("amount must be at least {MIN_AMOUNT}"),
        });
    }
    if amount > MAX_AMOUNT {
        return Err(DomainError::Validation {
            field: "amount".into(),
            message: format!("amount cannot exceed {MAX_AMOUNT}"),
        });
    }
    Ok(amount)
}

/// Validates and trims an external reference (customer id, order id).
pub fn validate_reference(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation {
            field: field.into(),
            message: format!("{field} is required"),
        });
    }
    if trimmed.len() > MAX_REFERENCE_LEN {
        return Err(DomainError::Validation {
            field: field.into(),
            message: format!("{field} too long (max {MAX_REFERENCE_LEN})"),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_bounds() {
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-5).is_err());
        assert_eq!(validate_amount(1).unwrap(), 1);
        assert_eq!(validate_amount(MAX_AMOUNT).unwrap(), MAX_AMOUNT);
        assert!(validate_amount(MAX_AMOUNT + 1).is_err());
    }

    #[test]
    fn test_reference_trimmed() {
        assert_eq!(validate_reference("customer_id", " cus_1 ").unwrap(), "cus_1");
    }

    #[test]
    fn test_empty_reference_fails() {
        let err = validate_reference("order_id", "   ").unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_long_reference_fails() {
        let long = "x".repeat(MAX_REFERENCE_LEN + 1);
        assert!(validate_reference("customer_id", &long).is_err());
    }
}
