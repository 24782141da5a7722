//! Refund ledger service.
//!
//! Owns the refund state machine. Reads payments through the payment ledger
//! and settles refund amounts against them via the ledger's internal
//! balance mutation, never directly.

use std::sync::Arc;

use tracing::{info, warn};

use payflow_types::{
    CreateRefundRequest, GatewayRegistry, LedgerRepository, Page, PaymentError, Refund,
    RefundFilter, RefundId, RefundStatus, RepoError,
    validate::{MAX_PAGE_LIMIT, validate_amount},
};

use crate::payment_ledger::PaymentLedger;

/// Application service owning the refund state machine.
pub struct RefundLedger<R: LedgerRepository> {
    repo: Arc<R>,
    payments: Arc<PaymentLedger<R>>,
    gateways: GatewayRegistry,
}

impl<R: LedgerRepository> RefundLedger<R> {
    /// Creates a new refund ledger over the given store, payment ledger, and
    /// gateways.
    pub fn new(repo: Arc<R>, payments: Arc<PaymentLedger<R>>, gateways: GatewayRegistry) -> Self {
        Self {
            repo,
            payments,
            gateways,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a refund against a captured payment.
    ///
    /// When `amount` is omitted the full available balance is refunded. The
    /// provider confirmation is treated as synchronous: on acceptance the
    /// refund completes immediately and the payment's balance is settled; the
    /// later asynchronous confirmation only marks it reconciled. A provider
    /// rejection returns the refund in `FAILED` status with the payment
    /// untouched - callers check the status rather than catching an error.
    pub async fn create_refund(&self, req: CreateRefundRequest) -> Result<Refund, PaymentError> {
        let payment = self.payments.get_payment(req.payment_id).await?;
        let available = payment.available_refund();
        let requested = req.amount.unwrap_or(available);
        let requested = validate_amount(requested)?;
        if requested > available {
            return Err(PaymentError::ExceedsAvailable {
                payment_id: payment.id,
                requested,
                available,
            });
        }

        let refund = Refund::new(
            payment.id,
            requested,
            payment.currency,
            req.reason,
            req.notes.clone(),
            req.metadata.clone().unwrap_or_default(),
        );
        let mut refund = self.repo.insert_refund(refund).await?;

        let provider_transaction_id = payment.provider_transaction_id.clone().ok_or_else(|| {
            PaymentError::Internal("captured payment missing provider transaction reference".into())
        })?;
        let gateway = self.gateways.for_provider(payment.provider);
        let outcome = gateway
            .refund(
                &provider_transaction_id,
                Some(requested),
                Some(req.reason.as_str()),
            )
            .await?;

        if outcome.success {
            refund.process(outcome.provider_refund_id.clone().unwrap_or_default())?;
            refund.complete()?;
            let refund = self.repo.update_refund(refund).await?;
            self.payments.apply_refund(payment.id, requested).await?;
            info!(
                refund_id = %refund.id,
                payment_id = %payment.id,
                amount = requested,
                "refund completed"
            );
            Ok(refund)
        } else {
            refund.fail()?;
            let refund = self.repo.update_refund(refund).await?;
            warn!(
                refund_id = %refund.id,
                payment_id = %payment.id,
                error_code = ?outcome.error_code,
                "refund rejected by provider"
            );
            Ok(refund)
        }
    }

    /// Cancels a pending refund.
    ///
    /// A non-pending refund is reported (logged) but not an error: the
    /// unchanged refund is returned and callers check the resulting status.
    pub async fn cancel_refund(&self, id: RefundId) -> Result<Refund, PaymentError> {
        let mut refund = self.require_refund(id).await?;
        if !refund.is_cancellable() {
            warn!(
                refund_id = %id,
                status = %refund.status,
                "cannot cancel refund in current state"
            );
            return Ok(refund);
        }
        refund.cancel()?;
        match self.repo.update_refund(refund).await {
            Ok(refund) => {
                info!(refund_id = %refund.id, "refund cancelled");
                Ok(refund)
            }
            Err(RepoError::Conflict { .. }) => {
                // Lost a concurrent update; return the state that won.
                let current = self.require_refund(id).await?;
                warn!(
                    refund_id = %id,
                    status = %current.status,
                    "refund changed state during cancellation"
                );
                Ok(current)
            }
            Err(err) => Err(err.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Gets a refund by id.
    pub async fn get_refund(&self, id: RefundId) -> Result<Refund, PaymentError> {
        self.require_refund(id).await
    }

    /// Lists refunds, newest first.
    pub async fn list_refunds(
        &self,
        filter: RefundFilter,
        page: Page,
    ) -> Result<Vec<Refund>, PaymentError> {
        let page = Page {
            limit: page.limit.clamp(1, MAX_PAGE_LIMIT),
            offset: page.offset,
        };
        self.repo
            .list_refunds(filter, page)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Webhook reconciliation
    // ─────────────────────────────────────────────────────────────────────────

    /// Applies an asynchronous refund confirmation from the provider.
    ///
    /// The `reconciled` marker is what keeps redelivered confirmations from
    /// double-settling: a refund the synchronous path already completed is
    /// only marked reconciled; only a refund still in flight is completed
    /// and settled against the payment here.
    pub(crate) async fn confirm_refund(
        &self,
        provider_refund_id: &str,
    ) -> Result<Refund, PaymentError> {
        let mut refund = self.require_refund_by_provider(provider_refund_id).await?;
        if refund.reconciled {
            return Ok(refund);
        }
        match refund.status {
            RefundStatus::Completed => {
                refund.reconcile()?;
                match self.repo.update_refund(refund).await {
                    Ok(refund) => Ok(refund),
                    Err(RepoError::Conflict { .. }) => {
                        // A concurrent delivery reconciled it first.
                        self.require_refund_by_provider(provider_refund_id).await
                    }
                    Err(err) => Err(err.into()),
                }
            }
            RefundStatus::Processing => {
                refund.complete()?;
                refund.reconcile()?;
                let refund = match self.repo.update_refund(refund).await {
                    Ok(refund) => refund,
                    Err(RepoError::Conflict { .. }) => {
                        return self.require_refund_by_provider(provider_refund_id).await;
                    }
                    Err(err) => return Err(err.into()),
                };
                self.payments
                    .apply_refund(refund.payment_id, refund.amount)
                    .await?;
                info!(
                    refund_id = %refund.id,
                    payment_id = %refund.payment_id,
                    "refund confirmed by provider event"
                );
                Ok(refund)
            }
            _ => Err(PaymentError::Internal(format!(
                "refund {} cannot be confirmed from status {}",
                refund.id, refund.status
            ))),
        }
    }

    /// Applies an asynchronous refund-failure report from the provider.
    pub(crate) async fn fail_refund(
        &self,
        provider_refund_id: &str,
    ) -> Result<Refund, PaymentError> {
        let mut refund = self.require_refund_by_provider(provider_refund_id).await?;
        match refund.status {
            RefundStatus::Failed => Ok(refund),
            RefundStatus::Pending | RefundStatus::Processing => {
                refund.fail()?;
                let refund = self.repo.update_refund(refund).await?;
                warn!(refund_id = %refund.id, "refund failed by provider event");
                Ok(refund)
            }
            _ => Err(PaymentError::Internal(format!(
                "refund {} cannot be failed from status {}",
                refund.id, refund.status
            ))),
        }
    }

    async fn require_refund(&self, id: RefundId) -> Result<Refund, PaymentError> {
        self.repo
            .get_refund(id)
            .await?
            .ok_or(PaymentError::RefundNotFound(id))
    }

    async fn require_refund_by_provider(
        &self,
        provider_refund_id: &str,
    ) -> Result<Refund, PaymentError> {
        self.repo
            .find_refund_by_provider_refund(provider_refund_id)
            .await?
            .ok_or_else(|| {
                PaymentError::Internal(format!("no refund for provider refund {provider_refund_id}"))
            })
    }
}
