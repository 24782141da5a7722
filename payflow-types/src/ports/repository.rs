//! Repository port trait.
//!
//! This is the primary port of the core: the ledgers speak to persistence
//! exclusively through it. Adapters (in-memory, SQL, ...) implement this
//! trait.

use crate::domain::{Payment, PaymentId, Refund, RefundId, WebhookEvent, WebhookEventId};
use crate::dto::{Page, PaymentFilter, RefundFilter};
use crate::error::RepoError;

/// Outcome of recording an inbound webhook event.
#[derive(Debug, Clone)]
pub enum RecordedEvent {
    /// First delivery of this provider event id.
    Fresh(WebhookEvent),
    /// The event id was already recorded; the stored event is returned.
    Duplicate(WebhookEvent),
}

/// Keyed store for payments, refunds, and webhook events.
///
/// Atomicity contract:
/// - `update_*` compares the entity's `version` against the stored version
///   and fails with `RepoError::Conflict` on mismatch, so two concurrent
///   read-modify-write cycles cannot both win.
/// - `insert_payment` atomically claims the idempotency key (when present)
///   and fails with `RepoError::Duplicate` if another payment holds it.
/// - `record_webhook_event` is an atomic insert-if-absent keyed by
///   `(provider, provider_event_id)`.
#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────

    /// Inserts a new payment, claiming its idempotency key.
    async fn insert_payment(&self, payment: Payment) -> Result<Payment, RepoError>;

    /// Version-checked update of an existing payment.
    async fn update_payment(&self, payment: Payment) -> Result<Payment, RepoError>;

    /// Gets a payment by id.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError>;

    /// Finds the payment that claimed an idempotency key.
    async fn find_payment_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Payment>, RepoError>;

    /// Finds a payment by its provider transaction reference.
    async fn find_payment_by_provider_tx(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Payment>, RepoError>;

    /// Lists payments ordered by creation time descending.
    async fn list_payments(
        &self,
        filter: PaymentFilter,
        page: Page,
    ) -> Result<Vec<Payment>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Refunds
    // ─────────────────────────────────────────────────────────────────────────

    /// Inserts a new refund.
    async fn insert_refund(&self, refund: Refund) -> Result<Refund, RepoError>;

    /// Version-checked update of an existing refund.
    async fn update_refund(&self, refund: Refund) -> Result<Refund, RepoError>;

    /// Gets a refund by id.
    async fn get_refund(&self, id: RefundId) -> Result<Option<Refund>, RepoError>;

    /// Finds a refund by its provider refund reference.
    async fn find_refund_by_provider_refund(
        &self,
        provider_refund_id: &str,
    ) -> Result<Option<Refund>, RepoError>;

    /// Lists refunds ordered by creation time descending.
    async fn list_refunds(
        &self,
        filter: RefundFilter,
        page: Page,
    ) -> Result<Vec<Refund>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Webhook events
    // ─────────────────────────────────────────────────────────────────────────

    /// Atomically records an event, or returns the already-stored one.
    async fn record_webhook_event(&self, event: WebhookEvent)
    -> Result<RecordedEvent, RepoError>;

    /// Version-checked update of a recorded event.
    async fn update_webhook_event(&self, event: WebhookEvent) -> Result<WebhookEvent, RepoError>;

    /// Gets a recorded event by local id.
    async fn get_webhook_event(
        &self,
        id: WebhookEventId,
    ) -> Result<Option<WebhookEvent>, RepoError>;
}
