//! Refund domain model and state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::currency::Currency;
use super::payment::PaymentId;
use crate::error::DomainError;

/// Unique identifier for a Refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefundId(Uuid);

impl RefundId {
    /// Creates a new random RefundId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a RefundId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RefundId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RefundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RefundId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Refund lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl AsRef<str> for RefundStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a refund was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    #[default]
    RequestedByCustomer,
    OrderCancelled,
    ProductNotReceived,
    ProductUnacceptable,
    Other,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Fraudulent => "fraudulent",
            Self::RequestedByCustomer => "requested_by_customer",
            Self::OrderCancelled => "order_cancelled",
            Self::ProductNotReceived => "product_not_received",
            Self::ProductUnacceptable => "product_unacceptable",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for RefundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A refund against a captured payment.
///
/// Terminal once completed, failed, or cancelled. `reconciled` records that
/// the asynchronous provider confirmation has been applied, so redelivered
/// confirmations never touch the owning payment's balance again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub payment_id: PaymentId,
    pub status: RefundStatus,
    /// Amount in integer minor units, inherited currency from the payment
    pub amount: i64,
    pub currency: Currency,
    pub reason: RefundReason,
    pub provider_refund_id: Option<String>,
    pub notes: Option<String>,
    pub metadata: Map<String, Value>,
    pub reconciled: bool,
    /// Optimistic concurrency token, bumped by the store on every update
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    /// Creates a new `PENDING` refund.
    pub fn new(
        payment_id: PaymentId,
        amount: i64,
        currency: Currency,
        reason: RefundReason,
        notes: Option<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RefundId::new(),
            payment_id,
            status: RefundStatus::Pending,
            amount,
            currency,
            reason,
            provider_refund_id: None,
            notes,
            metadata,
            reconciled: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the refund processing, recording the provider refund reference.
    pub fn process(&mut self, provider_refund_id: String) -> Result<(), DomainError> {
        if self.status != RefundStatus::Pending {
            return Err(self.illegal_transition());
        }
        self.status = RefundStatus::Processing;
        self.provider_refund_id = Some(provider_refund_id);
        self.touch();
        Ok(())
    }

    /// Marks the refund completed.
    pub fn complete(&mut self) -> Result<(), DomainError> {
        if self.status != RefundStatus::Processing {
            return Err(self.illegal_transition());
        }
        self.status = RefundStatus::Completed;
        self.touch();
        Ok(())
    }

    /// Marks the refund failed.
    pub fn fail(&mut self) -> Result<(), DomainError> {
        if !matches!(self.status, RefundStatus::Pending | RefundStatus::Processing) {
            return Err(self.illegal_transition());
        }
        self.status = RefundStatus::Failed;
        self.touch();
        Ok(())
    }

    /// Cancels a refund that has not reached the provider.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !self.is_cancellable() {
            return Err(self.illegal_transition());
        }
        self.status = RefundStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// Records that the asynchronous provider confirmation has been applied.
    pub fn reconcile(&mut self) -> Result<(), DomainError> {
        if self.status != RefundStatus::Completed {
            return Err(self.illegal_transition());
        }
        self.reconciled = true;
        self.touch();
        Ok(())
    }

    pub fn is_cancellable(&self) -> bool {
        self.status == RefundStatus::Pending
    }

    fn illegal_transition(&self) -> DomainError {
        DomainError::IllegalTransition {
            entity: "refund",
            from: self.status.as_str(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refund(amount: i64) -> Refund {
        Refund::new(
            PaymentId::new(),
            amount,
            Currency::parse("USD").unwrap(),
            RefundReason::RequestedByCustomer,
            None,
            Map::new(),
        )
    }

    #[test]
    fn test_happy_path() {
        let mut r = refund(500);
        assert!(r.is_cancellable());
        r.process("cnr_1".into()).unwrap();
        assert_eq!(r.status, RefundStatus::Processing);
        assert!(!r.is_cancellable());
        r.complete().unwrap();
        assert_eq!(r.status, RefundStatus::Completed);
        assert!(!r.reconciled);
        r.reconcile().unwrap();
        assert!(r.reconciled);
    }

    #[test]
    fn test_cancel_only_from_pending() {
        let mut r = refund(500);
        r.process("cnr_1".into()).unwrap();
        assert!(matches!(
            r.cancel(),
            Err(DomainError::IllegalTransition { .. })
        ));
        assert_eq!(r.status, RefundStatus::Processing);
    }

    #[test]
    fn test_fail_from_pending_and_processing() {
        let mut pending = refund(500);
        pending.fail().unwrap();
        assert_eq!(pending.status, RefundStatus::Failed);

        let mut processing = refund(500);
        processing.process("cnr_2".into()).unwrap();
        processing.fail().unwrap();
        assert_eq!(processing.status, RefundStatus::Failed);
    }

    #[test]
    fn test_reconcile_requires_completed() {
        let mut r = refund(500);
        assert!(r.reconcile().is_err());
        r.process("cnr_3".into()).unwrap();
        assert!(r.reconcile().is_err());
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut r = refund(500);
        r.process("cnr_4".into()).unwrap();
        r.complete().unwrap();
        assert!(r.fail().is_err());
        assert!(r.cancel().is_err());
    }
}
