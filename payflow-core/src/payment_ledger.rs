//! Payment ledger service.
//!
//! Orchestrates payment operations through the repository and gateway ports.
//! Every mutation of a `Payment` in the system goes through this service.

use std::sync::Arc;

use tracing::{info, warn};

use payflow_types::{
    ChargeRequest, CreatePaymentRequest, GatewayRegistry, LedgerRepository, Page, Payment,
    PaymentError, PaymentFilter, PaymentId, PaymentStatus, RepoError, ports::ALREADY_VOIDED,
    validate::{MAX_PAGE_LIMIT, validate_amount, validate_reference},
};

/// Attempts for compare-and-swap loops where re-validation is possible.
const CAS_ATTEMPTS: usize = 5;

/// Application service owning the payment state machine.
///
/// Generic over `R: LedgerRepository` - the store adapter is injected at
/// compile time, which keeps the service testable against an in-memory repo.
pub struct PaymentLedger<R: LedgerRepository> {
    repo: Arc<R>,
    gateways: GatewayRegistry,
}

impl<R: LedgerRepository> PaymentLedger<R> {
    /// Creates a new payment ledger over the given store and gateways.
    pub fn new(repo: Arc<R>, gateways: GatewayRegistry) -> Self {
        Self { repo, gateways }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a payment and charges it through the configured provider.
    ///
    /// The idempotency key (when present) is claimed in the store *before*
    /// the provider call, so a repeated logical request resolves to the
    /// payment that claimed the key first and charges at most once.
    ///
    /// A provider decline is a terminal business outcome: the payment moves
    /// to `FAILED` and a `Declined` error is returned. A transport fault
    /// leaves the payment `PENDING` and propagates as a retryable error.
    pub async fn create_payment(
        &self,
        req: CreatePaymentRequest,
    ) -> Result<Payment, PaymentError> {
        let amount = validate_amount(req.amount)?;
        let customer_id = validate_reference("customer_id", &req.customer_id)?;
        let order_id = validate_reference("order_id", &req.order_id)?;
        if !req.currency.is_common() {
            warn!(currency = %req.currency, "uncommon currency code accepted");
        }

        if let Some(key) = req.idempotency_key.as_deref() {
            if let Some(existing) = self.repo.find_payment_by_idempotency_key(key).await? {
                info!(payment_id = %existing.id, "idempotent replay of create_payment");
                return Ok(existing);
            }
        }

        let payment = Payment::new(
            amount,
            req.currency,
            customer_id,
            order_id,
            req.provider,
            req.description.clone(),
            req.metadata.clone().unwrap_or_default(),
            req.idempotency_key.clone(),
        );
        let mut payment = match self.repo.insert_payment(payment).await {
            Ok(payment) => payment,
            Err(RepoError::Duplicate { .. }) => {
                // Lost the race on the idempotency key; surface the winner.
                let key = req.idempotency_key.as_deref().unwrap_or_default();
                return self
                    .repo
                    .find_payment_by_idempotency_key(key)
                    .await?
                    .ok_or_else(|| {
                        PaymentError::Internal("idempotency key claimed but payment missing".into())
                    });
            }
            Err(err) => return Err(err.into()),
        };

        let gateway = self.gateways.for_provider(req.provider);
        let outcome = gateway
            .charge(ChargeRequest {
                amount,
                currency: req.currency,
                customer_id: payment.customer_id.clone(),
                description: payment.description.clone(),
                metadata: Some(payment.metadata.clone()),
                capture: req.capture_immediately,
            })
            .await?;

        if outcome.success {
            if req.capture_immediately {
                payment.capture(None)?;
            } else {
                payment
                    .authorize(outcome.provider_transaction_id.clone().unwrap_or_default())?;
            }
            payment.provider_transaction_id = outcome.provider_transaction_id;
            let payment = self.repo.update_payment(payment).await?;
            info!(
                payment_id = %payment.id,
                status = %payment.status,
                provider_transaction_id = ?payment.provider_transaction_id,
                "payment created"
            );
            Ok(payment)
        } else {
            payment.fail()?;
            let payment = self.repo.update_payment(payment).await?;
            warn!(
                payment_id = %payment.id,
                decline_code = ?outcome.error_code,
                "payment declined by provider"
            );
            Err(PaymentError::Declined {
                provider: req.provider,
                reason: outcome
                    .error_message
                    .unwrap_or_else(|| "payment declined".into()),
                decline_code: outcome.error_code,
            })
        }
    }

    /// Captures an authorized payment, optionally partially.
    ///
    /// Exactly one of two concurrent captures wins: the loser's
    /// version-checked save conflicts, and it reports `AlreadyProcessed`
    /// with the state that won.
    pub async fn capture_payment(
        &self,
        id: PaymentId,
        amount: Option<i64>,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self.require_payment(id).await?;
        if !payment.is_capturable() {
            return Err(PaymentError::AlreadyProcessed {
                payment_id: id,
                status: payment.status,
            });
        }
        if let Some(requested) = amount {
            let requested = validate_amount(requested)?;
            if requested > payment.amount {
                return Err(PaymentError::Validation {
                    field: "amount".into(),
                    message: format!(
                        "capture amount {requested} exceeds authorized amount {}",
                        payment.amount
                    ),
                });
            }
        }
        let provider_transaction_id = payment.provider_transaction_id.clone().ok_or_else(|| {
            PaymentError::Internal("authorized payment missing provider transaction reference".into())
        })?;

        let gateway = self.gateways.for_provider(payment.provider);
        let outcome = gateway.capture(&provider_transaction_id, amount).await?;
        if !outcome.success {
            return Err(PaymentError::Declined {
                provider: payment.provider,
                reason: outcome
                    .error_message
                    .unwrap_or_else(|| "capture rejected".into()),
                decline_code: outcome.error_code,
            });
        }

        payment.capture(amount)?;
        match self.repo.update_payment(payment).await {
            Ok(payment) => {
                info!(
                    payment_id = %payment.id,
                    captured_amount = payment.captured_amount,
                    "payment captured"
                );
                Ok(payment)
            }
            Err(RepoError::Conflict { .. }) => {
                // Lost a concurrent update; report the state that won.
                let current = self.require_payment(id).await?;
                Err(PaymentError::AlreadyProcessed {
                    payment_id: id,
                    status: current.status,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Cancels a pending or authorized payment, voiding it at the provider.
    ///
    /// An `already_voided` rejection from the provider counts as success.
    pub async fn cancel_payment(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        let mut payment = self.require_payment(id).await?;
        if !matches!(
            payment.status,
            PaymentStatus::Pending | PaymentStatus::Authorized
        ) {
            return Err(PaymentError::AlreadyProcessed {
                payment_id: id,
                status: payment.status,
            });
        }

        if let Some(provider_transaction_id) = payment.provider_transaction_id.clone() {
            let gateway = self.gateways.for_provider(payment.provider);
            let outcome = gateway.void(&provider_transaction_id).await?;
            if !outcome.success && outcome.error_code.as_deref() != Some(ALREADY_VOIDED) {
                return Err(PaymentError::Declined {
                    provider: payment.provider,
                    reason: outcome
                        .error_message
                        .unwrap_or_else(|| "void rejected".into()),
                    decline_code: outcome.error_code,
                });
            }
        }

        payment.cancel()?;
        match self.repo.update_payment(payment).await {
            Ok(payment) => {
                info!(payment_id = %payment.id, "payment cancelled");
                Ok(payment)
            }
            Err(RepoError::Conflict { .. }) => {
                let current = self.require_payment(id).await?;
                Err(PaymentError::AlreadyProcessed {
                    payment_id: id,
                    status: current.status,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Gets a payment by id.
    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        self.require_payment(id).await
    }

    /// Lists payments, newest first.
    pub async fn list_payments(
        &self,
        filter: PaymentFilter,
        page: Page,
    ) -> Result<Vec<Payment>, PaymentError> {
        let page = Page {
            limit: page.limit.clamp(1, MAX_PAGE_LIMIT),
            offset: page.offset,
        };
        self.repo
            .list_payments(filter, page)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal mutations (refund ledger, webhook reconciliation)
    // ─────────────────────────────────────────────────────────────────────────

    /// Records a refund against a payment's balance.
    ///
    /// Compare-and-swap with bounded retries: on a version conflict the
    /// payment is re-read and the availability check re-runs against the
    /// fresh state, so concurrent refunds can never overdraw the captured
    /// amount.
    pub(crate) async fn apply_refund(
        &self,
        id: PaymentId,
        amount: i64,
    ) -> Result<Payment, PaymentError> {
        for _ in 0..CAS_ATTEMPTS {
            let mut payment = self.require_payment(id).await?;
            let available = payment.available_refund();
            if amount > available {
                return Err(PaymentError::ExceedsAvailable {
                    payment_id: id,
                    requested: amount,
                    available,
                });
            }
            payment.apply_refund(amount)?;
            match self.repo.update_payment(payment).await {
                Ok(payment) => return Ok(payment),
                Err(RepoError::Conflict { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(PaymentError::Internal(format!(
            "could not apply refund to payment {id} after {CAS_ATTEMPTS} attempts"
        )))
    }

    /// Applies an asynchronous capture confirmation from the provider.
    ///
    /// Idempotent: a payment already captured by the synchronous path is
    /// returned unchanged.
    pub(crate) async fn confirm_capture(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self
            .repo
            .find_payment_by_provider_tx(provider_transaction_id)
            .await?
            .ok_or_else(|| {
                PaymentError::Internal(format!(
                    "no payment for provider transaction {provider_transaction_id}"
                ))
            })?;

        match payment.status {
            PaymentStatus::Captured
            | PaymentStatus::PartiallyRefunded
            | PaymentStatus::Refunded => Ok(payment),
            PaymentStatus::Authorized => {
                payment.capture(None)?;
                match self.repo.update_payment(payment).await {
                    Ok(payment) => {
                        info!(payment_id = %payment.id, "capture confirmed by provider event");
                        Ok(payment)
                    }
                    Err(RepoError::Conflict { .. }) => {
                        let current = self
                            .repo
                            .find_payment_by_provider_tx(provider_transaction_id)
                            .await?
                            .ok_or_else(|| {
                                PaymentError::Internal("payment vanished during capture".into())
                            })?;
                        if matches!(
                            current.status,
                            PaymentStatus::Captured
                                | PaymentStatus::PartiallyRefunded
                                | PaymentStatus::Refunded
                        ) {
                            Ok(current)
                        } else {
                            Err(PaymentError::AlreadyProcessed {
                                payment_id: current.id,
                                status: current.status,
                            })
                        }
                    }
                    Err(err) => Err(err.into()),
                }
            }
            _ => Err(PaymentError::AlreadyProcessed {
                payment_id: payment.id,
                status: payment.status,
            }),
        }
    }

    /// Applies an asynchronous charge-failure report from the provider.
    pub(crate) async fn fail_authorization(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self
            .repo
            .find_payment_by_provider_tx(provider_transaction_id)
            .await?
            .ok_or_else(|| {
                PaymentError::Internal(format!(
                    "no payment for provider transaction {provider_transaction_id}"
                ))
            })?;

        match payment.status {
            PaymentStatus::Failed => Ok(payment),
            PaymentStatus::Pending => {
                payment.fail()?;
                let payment = self.repo.update_payment(payment).await?;
                warn!(payment_id = %payment.id, "payment failed by provider event");
                Ok(payment)
            }
            _ => Err(PaymentError::AlreadyProcessed {
                payment_id: payment.id,
                status: payment.status,
            }),
        }
    }

    async fn require_payment(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        self.repo
            .get_payment(id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(id))
    }
}
