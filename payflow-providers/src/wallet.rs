//! Hosted wallet gateway adapter.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use payflow_types::{
    CaptureOutcome, ChargeOutcome, ChargeRequest, GatewayError, ProviderGateway, ProviderKind,
    ProviderTransaction, RefundOutcome, VoidOutcome,
};

/// Credentials and environment for the wallet provider.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub client_id: String,
    pub client_secret: String,
    pub environment: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            client_id: "wl_sandbox_client".into(),
            client_secret: "wl_sandbox_secret".into(),
            environment: "sandbox".into(),
        }
    }
}

/// Wallet implementation of the `ProviderGateway` port.
///
/// Sandbox-level adapter; the wallet API models a charge as an order that is
/// captured on approval, so authorize-only charges stay pending on the
/// wallet side until captured.
pub struct WalletGateway {
    config: WalletConfig,
}

impl WalletGateway {
    pub fn new(config: WalletConfig) -> Self {
        Self { config }
    }

    fn new_order_ref(&self) -> String {
        format!("wl_{}", Uuid::new_v4().simple())
    }

    fn new_refund_ref(&self) -> String {
        format!("wlr_{}", Uuid::new_v4().simple())
    }
}

#[async_trait]
impl ProviderGateway for WalletGateway {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Wallet
    }

    async fn charge(&self, req: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let provider_transaction_id = self.new_order_ref();
        info!(
            environment = %self.config.environment,
            client_id = %self.config.client_id,
            customer_id = %req.customer_id,
            amount = req.amount,
            currency = %req.currency,
            capture = req.capture,
            provider_transaction_id = %provider_transaction_id,
            "wallet order created"
        );
        Ok(ChargeOutcome::approved(provider_transaction_id))
    }

    async fn capture(
        &self,
        provider_transaction_id: &str,
        amount: Option<i64>,
    ) -> Result<CaptureOutcome, GatewayError> {
        info!(provider_transaction_id, amount = ?amount, "wallet capture");
        Ok(CaptureOutcome::captured(
            provider_transaction_id,
            amount.unwrap_or_default(),
        ))
    }

    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount: Option<i64>,
        reason: Option<&str>,
    ) -> Result<RefundOutcome, GatewayError> {
        let provider_refund_id = self.new_refund_ref();
        info!(
            provider_transaction_id,
            amount = ?amount,
            reason = ?reason,
            provider_refund_id = %provider_refund_id,
            "wallet refund"
        );
        Ok(RefundOutcome::accepted(provider_refund_id))
    }

    async fn void(&self, provider_transaction_id: &str) -> Result<VoidOutcome, GatewayError> {
        info!(provider_transaction_id, "wallet void");
        Ok(VoidOutcome::voided())
    }

    async fn get_transaction(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<ProviderTransaction>, GatewayError> {
        info!(provider_transaction_id, "wallet order lookup");
        Ok(Some(ProviderTransaction {
            provider_transaction_id: provider_transaction_id.to_string(),
            status: "COMPLETED".into(),
            amount: 0,
            currency: "USD".into(),
        }))
    }
}
