//! Error types for the payment orchestration core.

use serde_json::{Value, json};

use crate::domain::{PaymentId, PaymentStatus, ProviderKind, RefundId};

/// Domain-level errors (business-rule violations raised by the models).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("illegal {entity} transition from {from}")]
    IllegalTransition {
        entity: &'static str,
        from: &'static str,
    },

    #[error("refund amount {requested} exceeds available {available}")]
    ExceedsAvailable { requested: i64, available: i64 },
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("version conflict for {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    #[error("duplicate {entity} for key {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("entity not found")]
    NotFound,
}

/// Transport faults from a provider gateway.
///
/// These are the retryable category; ordinary business declines never appear
/// here - adapters report them inline in the call's outcome struct.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: ProviderKind, timeout_ms: u64 },

    #[error("provider {provider} connection failed: {reason}")]
    Connection { provider: ProviderKind, reason: String },
}

/// Coordinator misuse errors.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("transaction already in progress")]
    AlreadyActive,

    #[error("no active transaction")]
    NotActive,
}

/// Caller-facing errors with stable codes and machine-readable details.
///
/// The excluded API layer maps these to transport-level statuses via
/// [`PaymentError::code`] and [`PaymentError::details`].
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("refund not found: {0}")]
    RefundNotFound(RefundId),

    #[error("payment declined: {reason}")]
    Declined {
        provider: ProviderKind,
        reason: String,
        decline_code: Option<String>,
    },

    #[error("payment {payment_id} already processed with status {status}")]
    AlreadyProcessed {
        payment_id: PaymentId,
        status: PaymentStatus,
    },

    #[error("refund amount {requested} exceeds available {available}")]
    ExceedsAvailable {
        payment_id: PaymentId,
        requested: i64,
        available: i64,
    },

    #[error("webhook signature validation failed: {reason}")]
    SignatureInvalid {
        provider: ProviderKind,
        reason: String,
    },

    #[error("provider {provider} timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: ProviderKind, timeout_ms: u64 },

    #[error("provider {provider} connection failed: {reason}")]
    ProviderConnection { provider: ProviderKind, reason: String },

    #[error("validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Stable machine-readable code for the caller-facing error surface.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::RefundNotFound(_) => "REFUND_NOT_FOUND",
            Self::Declined { .. } => "PAYMENT_DECLINED",
            Self::AlreadyProcessed { .. } => "PAYMENT_ALREADY_PROCESSED",
            Self::ExceedsAvailable { .. } => "REFUND_EXCEEDS_PAYMENT",
            Self::SignatureInvalid { .. } => "WEBHOOK_SIGNATURE_INVALID",
            Self::ProviderTimeout { .. } => "PROVIDER_TIMEOUT",
            Self::ProviderConnection { .. } => "PROVIDER_CONNECTION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the caller may retry with backoff (transient infra faults).
    ///
    /// Business outcomes (declines, state conflicts, over-refunds) must never
    /// be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout { .. } | Self::ProviderConnection { .. }
        )
    }

    /// Machine-readable detail map, suitable for transport serialization.
    pub fn details(&self) -> Value {
        match self {
            Self::PaymentNotFound(id) => json!({ "payment_id": id }),
            Self::RefundNotFound(id) => json!({ "refund_id": id }),
            Self::Declined {
                provider,
                reason,
                decline_code,
            } => json!({
                "provider": provider.as_str(),
                "reason": reason,
                "decline_code": decline_code,
            }),
            Self::AlreadyProcessed { payment_id, status } => json!({
                "payment_id": payment_id,
                "status": status.as_str(),
            }),
            Self::ExceedsAvailable {
                payment_id,
                requested,
                available,
            } => json!({
                "payment_id": payment_id,
                "requested_amount": requested,
                "available_amount": available,
            }),
            Self::SignatureInvalid { provider, reason } => json!({
                "provider": provider.as_str(),
                "reason": reason,
            }),
            Self::ProviderTimeout {
                provider,
                timeout_ms,
            } => json!({
                "provider": provider.as_str(),
                "timeout_ms": timeout_ms,
            }),
            Self::ProviderConnection { provider, reason } => json!({
                "provider": provider.as_str(),
                "reason": reason,
            }),
            Self::Validation { field, .. } => json!({ "field": field }),
            Self::Internal(_) => json!({}),
        }
    }
}

impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => Self::Validation { field, message },
            DomainError::ExceedsAvailable {
                requested,
                available,
            } => Self::Validation {
                field: "amount".into(),
                message: format!("refund amount {requested} exceeds available {available}"),
            },
            // Ledgers gate every transition before calling the model, so a
            // model-level rejection indicates a programming error.
            DomainError::IllegalTransition { entity, from } => {
                Self::Internal(format!("illegal {entity} transition from {from}"))
            }
        }
    }
}

impl From<RepoError> for PaymentError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::Storage(e) => Self::Internal(e),
            RepoError::Conflict { entity, id } => {
                Self::Internal(format!("unresolved version conflict for {entity} {id}"))
            }
            RepoError::Duplicate { entity, key } => {
                Self::Internal(format!("unresolved duplicate {entity} for key {key}"))
            }
            RepoError::NotFound => Self::Internal("entity not found".into()),
        }
    }
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout {
                provider,
                timeout_ms,
            } => Self::ProviderTimeout {
                provider,
                timeout_ms,
            },
            GatewayError::Connection { provider, reason } => {
                Self::ProviderConnection { provider, reason }
            }
        }
    }
}

impl From<CoordinatorError> for PaymentError {
    fn from(err: CoordinatorError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = PaymentError::ExceedsAvailable {
            payment_id: PaymentId::new(),
            requested: 20000,
            available: 9999,
        };
        assert_eq!(err.code(), "REFUND_EXCEEDS_PAYMENT");
        assert_eq!(err.details()["requested_amount"], 20000);
        assert_eq!(err.details()["available_amount"], 9999);
    }

    #[test]
    fn test_retryability_split() {
        let timeout = PaymentError::ProviderTimeout {
            provider: ProviderKind::CardNetwork,
            timeout_ms: 5000,
        };
        assert!(timeout.is_retryable());

        let declined = PaymentError::Declined {
            provider: ProviderKind::CardNetwork,
            reason: "insufficient funds".into(),
            decline_code: Some("card_declined".into()),
        };
        assert!(!declined.is_retryable());
    }

    #[test]
    fn test_gateway_error_conversion() {
        let err: PaymentError = GatewayError::Connection {
            provider: ProviderKind::Wallet,
            reason: "dns failure".into(),
        }
        .into();
        assert_eq!(err.code(), "PROVIDER_CONNECTION_ERROR");
    }
}
