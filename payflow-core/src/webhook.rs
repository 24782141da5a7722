//! Webhook verification, deduplication, and dispatch.
//!
//! Providers deliver events at least once; this module makes the ledger
//! effects at most once. Every delivery is authenticated before its payload
//! is parsed, recorded under its provider-assigned event id, and routed to a
//! handler only on first processing.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use payflow_types::{
    LedgerRepository, PaymentError, PaymentResource, ProviderKind, RecordedEvent, RefundResource,
    RepoError, WebhookEnvelope, WebhookEvent, WebhookEventId, WebhookOutcome, WebhookReceipt,
    WebhookStatus,
};

use crate::payment_ledger::PaymentLedger;
use crate::refund_ledger::RefundLedger;
use crate::signature;

/// Capture confirmation for a charge.
pub const EVENT_PAYMENT_CAPTURED: &str = "payment.captured";
/// Charge failure reported after the fact.
pub const EVENT_PAYMENT_FAILED: &str = "payment.failed";
/// Refund confirmation.
pub const EVENT_REFUND_COMPLETED: &str = "refund.completed";
/// Refund failure.
pub const EVENT_REFUND_FAILED: &str = "refund.failed";

/// Maximum accepted clock skew between the signature timestamp and now.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Per-provider shared secrets for signature verification.
#[derive(Debug, Clone)]
pub struct WebhookSecrets {
    pub card_network: String,
    pub wallet: String,
}

impl WebhookSecrets {
    fn for_provider(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::CardNetwork => &self.card_network,
            ProviderKind::Wallet => &self.wallet,
        }
    }
}

struct SignatureHeader {
    timestamp: i64,
    signature: String,
}

/// Parses a `t=<unix>,v1=<hex>` signature header.
fn parse_signature_header(header: &str) -> Result<SignatureHeader, String> {
    let mut timestamp = None;
    let mut signature = None;
    for element in header.split(',') {
        match element.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value.to_string()),
            Some(("v1", value)) => signature = Some(value.to_string()),
            _ => {}
        }
    }
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err("missing signature elements".into());
    };
    let timestamp = timestamp
        .parse::<i64>()
        .map_err(|_| "malformed timestamp".to_string())?;
    Ok(SignatureHeader {
        timestamp,
        signature,
    })
}

/// Authenticates inbound provider events and applies them idempotently.
pub struct WebhookVerifier<R: LedgerRepository> {
    repo: Arc<R>,
    payments: Arc<PaymentLedger<R>>,
    refunds: Arc<RefundLedger<R>>,
    secrets: WebhookSecrets,
    tolerance_secs: i64,
}

impl<R: LedgerRepository> WebhookVerifier<R> {
    pub fn new(
        repo: Arc<R>,
        payments: Arc<PaymentLedger<R>>,
        refunds: Arc<RefundLedger<R>>,
        secrets: WebhookSecrets,
    ) -> Self {
        Self {
            repo,
            payments,
            refunds,
            secrets,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Overrides the freshness tolerance.
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies the signature header against the raw request body.
    ///
    /// Rejects before any payload parsing: missing elements, stale
    /// timestamps, and digest mismatches all fail with `SignatureInvalid`.
    pub fn verify_signature(
        &self,
        provider: ProviderKind,
        body: &[u8],
        header: &str,
    ) -> Result<(), PaymentError> {
        let parsed = parse_signature_header(header)
            .map_err(|reason| PaymentError::SignatureInvalid { provider, reason })?;

        let now = Utc::now().timestamp();
        if (now - parsed.timestamp).abs() > self.tolerance_secs {
            return Err(PaymentError::SignatureInvalid {
                provider,
                reason: "timestamp outside tolerance".into(),
            });
        }

        let secret = self.secrets.for_provider(provider);
        if !signature::verify_payload(body, parsed.timestamp, secret, &parsed.signature) {
            return Err(PaymentError::SignatureInvalid {
                provider,
                reason: "signature mismatch".into(),
            });
        }
        Ok(())
    }

    /// Ingests one delivery: authenticate, record, and apply.
    ///
    /// Redelivered event ids are accepted without reapplying (the recorded
    /// event is the witness); a delivery whose previous attempt failed is
    /// retried under a versioned claim so concurrent redeliveries stay
    /// single-flight.
    pub async fn ingest(
        &self,
        provider: ProviderKind,
        body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookReceipt, PaymentError> {
        self.verify_signature(provider, body, signature_header)?;

        let payload: Value =
            serde_json::from_slice(body).map_err(|err| PaymentError::Validation {
                field: "payload".into(),
                message: format!("malformed webhook payload: {err}"),
            })?;
        let envelope: WebhookEnvelope =
            serde_json::from_value(payload.clone()).map_err(|err| PaymentError::Validation {
                field: "payload".into(),
                message: format!("malformed webhook envelope: {err}"),
            })?;

        let event = WebhookEvent::new(
            provider,
            envelope.id.clone(),
            envelope.event_type.clone(),
            payload,
        );
        let mut event = match self.repo.record_webhook_event(event).await? {
            RecordedEvent::Fresh(event) => event,
            RecordedEvent::Duplicate(existing) => match existing.status {
                WebhookStatus::Failed => {
                    // Retry the failed attempt under a versioned claim.
                    let existing_id = existing.id;
                    let mut retry = existing;
                    retry.start_processing();
                    match self.repo.update_webhook_event(retry).await {
                        Ok(event) => event,
                        Err(RepoError::Conflict { .. }) => {
                            // A concurrent redelivery claimed the retry first.
                            return Ok(Self::receipt(
                                &envelope,
                                existing_id,
                                WebhookOutcome::Duplicate,
                            ));
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                _ => {
                    info!(
                        provider_event_id = %existing.provider_event_id,
                        status = %existing.status,
                        "duplicate webhook delivery accepted without reapplying"
                    );
                    return Ok(Self::receipt(&envelope, existing.id, WebhookOutcome::Duplicate));
                }
            },
        };

        if event.status != WebhookStatus::Processing {
            event.start_processing();
            event = self.repo.update_webhook_event(event).await?;
        }

        match self.dispatch(&envelope).await {
            Ok(true) => {
                event.complete();
                let event = self.repo.update_webhook_event(event).await?;
                info!(
                    provider_event_id = %event.provider_event_id,
                    event_type = %event.event_type,
                    "webhook processed"
                );
                Ok(Self::receipt(&envelope, event.id, WebhookOutcome::Processed))
            }
            Ok(false) => {
                event.ignore("unhandled event type");
                let event = self.repo.update_webhook_event(event).await?;
                info!(
                    provider_event_id = %event.provider_event_id,
                    event_type = %event.event_type,
                    "webhook event type not handled"
                );
                Ok(Self::receipt(&envelope, event.id, WebhookOutcome::Ignored))
            }
            Err(err) => {
                event.fail(err.to_string());
                if let Err(update_err) = self.repo.update_webhook_event(event).await {
                    warn!(error = %update_err, "failed to record webhook failure");
                }
                Err(err)
            }
        }
    }

    /// Routes a recognized event to its ledger handler.
    ///
    /// Returns `Ok(false)` for unrecognized event types - a deliberate
    /// no-op, not a failure.
    async fn dispatch(&self, envelope: &WebhookEnvelope) -> Result<bool, PaymentError> {
        match envelope.event_type.as_str() {
            EVENT_PAYMENT_CAPTURED => {
                let resource: PaymentResource = parse_resource(&envelope.data.object)?;
                self.payments
                    .confirm_capture(&resource.provider_transaction_id)
                    .await?;
                Ok(true)
            }
            EVENT_PAYMENT_FAILED => {
                let resource: PaymentResource = parse_resource(&envelope.data.object)?;
                self.payments
                    .fail_authorization(&resource.provider_transaction_id)
                    .await?;
                Ok(true)
            }
            EVENT_REFUND_COMPLETED => {
                let resource: RefundResource = parse_resource(&envelope.data.object)?;
                self.refunds
                    .confirm_refund(&resource.provider_refund_id)
                    .await?;
                Ok(true)
            }
            EVENT_REFUND_FAILED => {
                let resource: RefundResource = parse_resource(&envelope.data.object)?;
                self.refunds
                    .fail_refund(&resource.provider_refund_id)
                    .await?;
                Ok(true)
            }
            other => {
                info!(event_type = other, "unrecognized webhook event type");
                Ok(false)
            }
        }
    }

    fn receipt(
        envelope: &WebhookEnvelope,
        event_id: WebhookEventId,
        outcome: WebhookOutcome,
    ) -> WebhookReceipt {
        WebhookReceipt {
            event_id,
            provider_event_id: envelope.id.clone(),
            event_type: envelope.event_type.clone(),
            outcome,
        }
    }
}

fn parse_resource<T: serde::de::DeserializeOwned>(object: &Value) -> Result<T, PaymentError> {
    serde_json::from_value(object.clone()).map_err(|err| PaymentError::Validation {
        field: "data.object".into(),
        message: format!("malformed event resource: {err}"),
    })
}
