//! Provider gateway port.
//!
//! One adapter per provider implements [`ProviderGateway`]. Ordinary
//! business declines (insufficient funds, expired card, ...) are reported
//! inline via `success = false` plus an error code; only transport faults
//! surface as [`GatewayError`](crate::error::GatewayError). All amounts are
//! integer minor units.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Currency, ProviderKind};
use crate::error::GatewayError;

/// Error code adapters return from `void` when the transaction was already
/// voided; callers treat it as success.
pub const ALREADY_VOIDED: &str = "already_voided";

/// Request passed to [`ProviderGateway::charge`].
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: i64,
    pub currency: Currency,
    pub customer_id: String,
    pub description: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    /// Capture immediately, or authorize only
    pub capture: bool,
}

/// Result of a charge call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeOutcome {
    pub success: bool,
    pub provider_transaction_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl ChargeOutcome {
    pub fn approved(provider_transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_transaction_id: Some(provider_transaction_id.into()),
            error_code: None,
            error_message: None,
        }
    }

    pub fn declined(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_transaction_id: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Result of a capture call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub success: bool,
    pub provider_transaction_id: Option<String>,
    pub captured_amount: i64,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl CaptureOutcome {
    pub fn captured(provider_transaction_id: impl Into<String>, captured_amount: i64) -> Self {
        Self {
            success: true,
            provider_transaction_id: Some(provider_transaction_id.into()),
            captured_amount,
            error_code: None,
            error_message: None,
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_transaction_id: None,
            captured_amount: 0,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Result of a refund call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub success: bool,
    pub provider_refund_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl RefundOutcome {
    pub fn accepted(provider_refund_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_refund_id: Some(provider_refund_id.into()),
            error_code: None,
            error_message: None,
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_refund_id: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Result of a void call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoidOutcome {
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl VoidOutcome {
    pub fn voided() -> Self {
        Self {
            success: true,
            error_code: None,
            error_message: None,
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// A transaction record as the provider sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTransaction {
    pub provider_transaction_id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
}

/// Contract every provider adapter implements.
#[async_trait::async_trait]
pub trait ProviderGateway: Send + Sync + 'static {
    /// Which provider this adapter speaks to.
    fn kind(&self) -> ProviderKind;

    /// Creates a charge, capturing immediately when `req.capture` is set.
    async fn charge(&self, req: ChargeRequest) -> Result<ChargeOutcome, GatewayError>;

    /// Captures a previously authorized transaction, optionally partially.
    async fn capture(
        &self,
        provider_transaction_id: &str,
        amount: Option<i64>,
    ) -> Result<CaptureOutcome, GatewayError>;

    /// Refunds a captured transaction, fully when `amount` is omitted.
    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount: Option<i64>,
        reason: Option<&str>,
    ) -> Result<RefundOutcome, GatewayError>;

    /// Voids an authorization or pending transaction.
    async fn void(&self, provider_transaction_id: &str) -> Result<VoidOutcome, GatewayError>;

    /// Looks up a transaction at the provider.
    async fn get_transaction(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<ProviderTransaction>, GatewayError>;
}

/// Fixed dispatch table from [`ProviderKind`] to one adapter instance.
///
/// Providers are a closed enumeration, so selection is a match rather than a
/// runtime string lookup.
#[derive(Clone)]
pub struct GatewayRegistry {
    card_network: Arc<dyn ProviderGateway>,
    wallet: Arc<dyn ProviderGateway>,
}

impl GatewayRegistry {
    pub fn new(card_network: Arc<dyn ProviderGateway>, wallet: Arc<dyn ProviderGateway>) -> Self {
        Self {
            card_network,
            wallet,
        }
    }

    pub fn for_provider(&self, kind: ProviderKind) -> &Arc<dyn ProviderGateway> {
        match kind {
            ProviderKind::CardNetwork => &self.card_network,
            ProviderKind::Wallet => &self.wallet,
        }
    }
}
