//! Payment domain model and state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::currency::Currency;
use crate::error::DomainError;

/// Unique identifier for a Payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random PaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PaymentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PaymentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Payment providers the system can route to.
///
/// A fixed enumeration: each variant maps to exactly one gateway adapter
/// instance, selected through `GatewayRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Card network acquirer gateway.
    CardNetwork,
    /// Hosted wallet gateway.
    Wallet,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CardNetwork => "card_network",
            Self::Wallet => "wallet",
        }
    }
}

impl AsRef<str> for ProviderKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Captured,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Authorized => "AUTHORIZED",
            Self::Captured => "CAPTURED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
            Self::PartiallyRefunded => "PARTIALLY_REFUNDED",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Refunded)
    }
}

impl AsRef<str> for PaymentStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment owned by the payment ledger.
///
/// Created on a charge request and mutated only through the transition
/// methods below; never physically deleted (retained for audit).
///
/// Invariant: `0 <= refunded_amount <= captured_amount <= amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    pub status: PaymentStatus,
    /// Requested amount in integer minor units
    pub amount: i64,
    pub currency: Currency,
    /// Customer reference supplied by the caller
    pub customer_id: String,
    /// Order reference supplied by the caller
    pub order_id: String,
    pub provider: ProviderKind,
    /// Provider transaction reference, set once authorized or captured
    pub provider_transaction_id: Option<String>,
    pub captured_amount: i64,
    pub refunded_amount: i64,
    pub description: Option<String>,
    pub metadata: Map<String, Value>,
    /// Key claimed before the provider charge; repeated requests with the
    /// same key resolve to the payment that claimed it first
    pub idempotency_key: Option<String>,
    /// Optimistic concurrency token, bumped by the store on every update
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new `PENDING` payment.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        amount: i64,
        currency: Currency,
        customer_id: String,
        order_id: String,
        provider: ProviderKind,
        description: Option<String>,
        metadata: Map<String, Value>,
        idempotency_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            status: PaymentStatus::Pending,
            amount,
            currency,
            customer_id,
            order_id,
            provider,
            provider_transaction_id: None,
            captured_amount: 0,
            refunded_amount: 0,
            description,
            metadata,
            idempotency_key,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the payment authorized, recording the provider reference.
    pub fn authorize(&mut self, provider_transaction_id: String) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(self.illegal_transition());
        }
        self.status = PaymentStatus::Authorized;
        self.provider_transaction_id = Some(provider_transaction_id);
        self.touch();
        Ok(())
    }

    /// Captures the payment for `amount`, or the full amount when omitted.
    ///
    /// Legal from `PENDING` (immediate capture on create) and `AUTHORIZED`.
    pub fn capture(&mut self, amount: Option<i64>) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            PaymentStatus::Pending | PaymentStatus::Authorized
        ) {
            return Err(self.illegal_transition());
        }
        let capture_amount = amount.unwrap_or(self.amount);
        if capture_amount < 1 || capture_amount > self.amount {
            return Err(DomainError::Validation {
                field: "amount".into(),
                message: format!(
                    "capture amount {capture_amount} must be between 1 and {}",
                    self.amount
                ),
            });
        }
        self.captured_amount = capture_amount;
        self.status = PaymentStatus::Captured;
        self.touch();
        Ok(())
    }

    /// Marks the payment failed (provider declined the charge).
    pub fn fail(&mut self) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(self.illegal_transition());
        }
        self.status = PaymentStatus::Failed;
        self.touch();
        Ok(())
    }

    /// Cancels a payment that has not been captured.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            PaymentStatus::Pending | PaymentStatus::Authorized
        ) {
            return Err(self.illegal_transition());
        }
        self.status = PaymentStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// Records a refund against this payment, deriving the refund status.
    pub fn apply_refund(&mut self, amount: i64) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            PaymentStatus::Captured | PaymentStatus::PartiallyRefunded
        ) {
            return Err(self.illegal_transition());
        }
        let available = self.available_refund();
        if amount < 1 || amount > available {
            return Err(DomainError::ExceedsAvailable {
                requested: amount,
                available,
            });
        }
        self.refunded_amount += amount;
        self.status = if self.refunded_amount >= self.captured_amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.touch();
        Ok(())
    }

    /// Amount still available for refund.
    pub fn available_refund(&self) -> i64 {
        self.captured_amount - self.refunded_amount
    }

    pub fn is_capturable(&self) -> bool {
        self.status == PaymentStatus::Authorized
    }

    pub fn is_refundable(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Captured | PaymentStatus::PartiallyRefunded
        ) && self.available_refund() > 0
    }

    fn illegal_transition(&self) -> DomainError {
        DomainError::IllegalTransition {
            entity: "payment",
            from: self.status.as_str(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
