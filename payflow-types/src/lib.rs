//! # Payflow Types
//!
//! Domain types and port traits for the payment orchestration core.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Payment, Refund, WebhookEvent, TransactionContext)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for service boundaries
//! - `error/` - Domain and caller-facing error types
//! - `validate/` - Shared input validators

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;
pub mod validate;

// Re-export commonly used types
pub use domain::{
    AuditRecord, Currency, OperationRecord, Payment, PaymentId, PaymentStatus, ProviderKind,
    Refund, RefundId, RefundReason, RefundStatus, TransactionContext, TransactionContextId,
    TransactionState, WebhookEvent, WebhookEventId, WebhookStatus,
};
pub use dto::*;
pub use error::{CoordinatorError, DomainError, GatewayError, PaymentError, RepoError};
pub use ports::{
    ALREADY_VOIDED, CaptureOutcome, ChargeOutcome, ChargeRequest, GatewayRegistry,
    LedgerRepository, ProviderGateway, ProviderTransaction, RecordedEvent, RefundOutcome,
    VoidOutcome,
};
