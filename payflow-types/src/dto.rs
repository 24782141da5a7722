//! Data Transfer Objects for service boundaries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{
    Currency, PaymentId, PaymentStatus, ProviderKind, RefundReason, RefundStatus, WebhookEventId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create (and charge) a new payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    /// Amount in smallest currency unit
    pub amount: i64,
    pub currency: Currency,
    pub customer_id: String,
    pub order_id: String,
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Optional idempotency key to prevent duplicate charges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Capture immediately, or authorize only
    #[serde(default = "default_capture_immediately")]
    pub capture_immediately: bool,
}

fn default_provider() -> ProviderKind {
    ProviderKind::CardNetwork
}

fn default_capture_immediately() -> bool {
    true
}

/// Filter for payment listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Refund DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to refund a captured payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefundRequest {
    pub payment_id: PaymentId,
    /// Amount in smallest currency unit; omitted means the full available balance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default)]
    pub reason: RefundReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Filter for refund listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RefundStatus>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pagination
// ─────────────────────────────────────────────────────────────────────────────

/// Offset pagination window.
///
/// Listings order by creation time descending; concurrent inserts may shift
/// offsets between pages. This is a pure pagination view, not a cursor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound webhook payload envelope.
///
/// Providers send at least an event id, an event type, and a nested resource
/// object specific to that type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Provider-assigned event id (the dedup key)
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookData {
    pub object: Value,
}

/// Resource payload of a capture confirmation or charge failure event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResource {
    pub provider_transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

/// Resource payload of a refund confirmation or refund failure event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResource {
    pub provider_refund_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

/// What a webhook delivery ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Event applied to the ledgers.
    Processed,
    /// Event id seen before; accepted without reapplying.
    Duplicate,
    /// Unrecognized event type; recorded and skipped.
    Ignored,
}

/// Acknowledgement returned to the transport layer after ingesting an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookReceipt {
    pub event_id: WebhookEventId,
    pub provider_event_id: String,
    pub event_type: String,
    pub outcome: WebhookOutcome,
}
