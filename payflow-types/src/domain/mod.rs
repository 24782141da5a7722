//! Domain models for the payment orchestration core.

mod context;
mod currency;
mod payment;
mod refund;
mod webhook;

pub use context::{
    AuditRecord, OperationRecord, TransactionContext, TransactionContextId, TransactionState,
};
pub use currency::Currency;
pub use payment::{Payment, PaymentId, PaymentStatus, ProviderKind};
pub use refund::{Refund, RefundId, RefundReason, RefundStatus};
pub use webhook::{WebhookEvent, WebhookEventId, WebhookStatus};
