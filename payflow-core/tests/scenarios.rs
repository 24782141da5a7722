//! End-to-end lifecycle scenarios over the in-memory store and sandbox
//! gateway adapters.

use std::sync::Arc;

use serde_json::json;

use payflow_core::signature;
use payflow_core::webhook::{EVENT_PAYMENT_CAPTURED, EVENT_REFUND_COMPLETED};
use payflow_core::{PaymentLedger, RefundLedger, TransactionCoordinator, WebhookSecrets, WebhookVerifier};
use payflow_providers::sandbox_registry;
use payflow_repo::MemoryRepo;
use payflow_types::{
    CreatePaymentRequest, CreateRefundRequest, Currency, Page, PaymentError, PaymentFilter,
    PaymentStatus, ProviderKind, RefundStatus, WebhookOutcome,
};

const CARD_SECRET: &str = "whsec_card_scenarios";
const WALLET_SECRET: &str = "whsec_wallet_scenarios";

struct Stack {
    payments: Arc<PaymentLedger<MemoryRepo>>,
    refunds: Arc<RefundLedger<MemoryRepo>>,
    verifier: WebhookVerifier<MemoryRepo>,
}

fn stack() -> Stack {
    let repo = Arc::new(MemoryRepo::new());
    let registry = sandbox_registry();
    let payments = Arc::new(PaymentLedger::new(repo.clone(), registry.clone()));
    let refunds = Arc::new(RefundLedger::new(repo.clone(), payments.clone(), registry));
    let verifier = WebhookVerifier::new(
        repo,
        payments.clone(),
        refunds.clone(),
        WebhookSecrets {
            card_network: CARD_SECRET.into(),
            wallet: WALLET_SECRET.into(),
        },
    );
    Stack {
        payments,
        refunds,
        verifier,
    }
}

fn charge(amount: i64, capture_immediately: bool) -> CreatePaymentRequest {
    CreatePaymentRequest {
        amount,
        currency: Currency::parse("USD").unwrap(),
        customer_id: "cus_42".into(),
        order_id: "ord_42".into(),
        provider: ProviderKind::CardNetwork,
        description: Some("order 42".into()),
        metadata: None,
        idempotency_key: None,
        capture_immediately,
    }
}

fn refund_of(payment: payflow_types::PaymentId, amount: Option<i64>) -> CreateRefundRequest {
    CreateRefundRequest {
        payment_id: payment,
        amount,
        reason: Default::default(),
        notes: None,
        metadata: None,
    }
}

fn sign(body: &[u8]) -> String {
    signature::signature_header(body, chrono::Utc::now().timestamp(), CARD_SECRET)
}

#[tokio::test]
async fn immediate_capture_then_partial_and_full_refund() {
    let s = stack();

    // Charge with immediate capture.
    let payment = s.payments.create_payment(charge(9999, true)).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Captured);
    assert_eq!(payment.captured_amount, 9999);
    assert_eq!(payment.refunded_amount, 0);

    // Partial refund.
    let partial = s
        .refunds
        .create_refund(refund_of(payment.id, Some(5000)))
        .await
        .unwrap();
    assert_eq!(partial.status, RefundStatus::Completed);
    assert_eq!(partial.amount, 5000);

    let after_partial = s.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(after_partial.status, PaymentStatus::PartiallyRefunded);
    assert_eq!(after_partial.refunded_amount, 5000);
    assert_eq!(after_partial.available_refund(), 4999);

    // Refund the remainder by omitting the amount.
    let remainder = s
        .refunds
        .create_refund(refund_of(payment.id, None))
        .await
        .unwrap();
    assert_eq!(remainder.amount, 4999);

    let settled = s.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(settled.status, PaymentStatus::Refunded);
    assert_eq!(settled.refunded_amount, 9999);

    // A settled payment admits no further refunds.
    let over = s.refunds.create_refund(refund_of(payment.id, Some(1))).await;
    assert!(matches!(over, Err(PaymentError::ExceedsAvailable { .. })));
}

#[tokio::test]
async fn over_refund_is_rejected_without_state_change() {
    let s = stack();
    let payment = s.payments.create_payment(charge(9999, true)).await.unwrap();

    let result = s
        .refunds
        .create_refund(refund_of(payment.id, Some(20000)))
        .await;
    match result {
        Err(PaymentError::ExceedsAvailable {
            requested,
            available,
            ..
        }) => {
            assert_eq!(requested, 20000);
            assert_eq!(available, 9999);
        }
        other => panic!("expected ExceedsAvailable, got {other:?}"),
    }

    let unchanged = s.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(unchanged.status, PaymentStatus::Captured);
    assert_eq!(unchanged.refunded_amount, 0);
}

#[tokio::test]
async fn double_capture_reports_winner_status() {
    let s = stack();
    let payment = s.payments.create_payment(charge(5000, false)).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Authorized);

    let first = s.payments.capture_payment(payment.id, None).await.unwrap();
    assert_eq!(first.status, PaymentStatus::Captured);

    let second = s.payments.capture_payment(payment.id, None).await;
    match second {
        Err(PaymentError::AlreadyProcessed { status, .. }) => {
            assert_eq!(status, PaymentStatus::Captured);
        }
        other => panic!("expected AlreadyProcessed, got {other:?}"),
    }
}

#[tokio::test]
async fn tampered_webhook_rejected_then_replay_applies_once() {
    let s = stack();
    let payment = s.payments.create_payment(charge(5000, false)).await.unwrap();
    let provider_tx = payment.provider_transaction_id.clone().unwrap();

    let body = serde_json::to_vec(&json!({
        "id": "evt_cap_9",
        "type": EVENT_PAYMENT_CAPTURED,
        "data": { "object": { "provider_transaction_id": provider_tx } },
    }))
    .unwrap();
    let header = sign(&body);

    // Tampered body: recomputed digest no longer matches the header.
    let mut tampered = body.clone();
    tampered.extend_from_slice(b"\n");
    let rejected = s
        .verifier
        .ingest(ProviderKind::CardNetwork, &tampered, &header)
        .await;
    assert!(matches!(
        rejected,
        Err(PaymentError::SignatureInvalid { .. })
    ));
    let untouched = s.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(untouched.status, PaymentStatus::Authorized);

    // Correct delivery applies the capture.
    let first = s
        .verifier
        .ingest(ProviderKind::CardNetwork, &body, &sign(&body))
        .await
        .unwrap();
    assert_eq!(first.outcome, WebhookOutcome::Processed);
    let captured = s.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(captured.status, PaymentStatus::Captured);

    // Redelivery is accepted without reapplying.
    let second = s
        .verifier
        .ingest(ProviderKind::CardNetwork, &body, &sign(&body))
        .await
        .unwrap();
    assert_eq!(second.outcome, WebhookOutcome::Duplicate);
    let after_replay = s.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(after_replay.version, captured.version);
}

#[tokio::test]
async fn refund_confirmation_reconciles_without_double_settling() {
    let s = stack();
    let payment = s.payments.create_payment(charge(9999, true)).await.unwrap();
    let refund = s
        .refunds
        .create_refund(refund_of(payment.id, Some(5000)))
        .await
        .unwrap();

    let body = serde_json::to_vec(&json!({
        "id": "evt_ref_9",
        "type": EVENT_REFUND_COMPLETED,
        "data": { "object": { "provider_refund_id": refund.provider_refund_id } },
    }))
    .unwrap();

    for _ in 0..2 {
        s.verifier
            .ingest(ProviderKind::CardNetwork, &body, &sign(&body))
            .await
            .unwrap();
    }

    let settled = s.payments.get_payment(payment.id).await.unwrap();
    assert_eq!(settled.refunded_amount, 5000);
    assert_eq!(settled.status, PaymentStatus::PartiallyRefunded);

    let reconciled = s.refunds.get_refund(refund.id).await.unwrap();
    assert!(reconciled.reconciled);
}

#[tokio::test]
async fn listings_paginate_newest_first() {
    let s = stack();
    for _ in 0..3 {
        s.payments.create_payment(charge(1000, true)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let all = s
        .payments
        .list_payments(PaymentFilter::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[0].created_at >= all[1].created_at);
    assert!(all[1].created_at >= all[2].created_at);

    let windowed = s
        .payments
        .list_payments(
            PaymentFilter::default(),
            Page {
                limit: 2,
                offset: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(windowed.len(), 2);
    assert_eq!(windowed[0].id, all[1].id);
}

#[tokio::test]
async fn grouped_flow_rolls_back_and_compensates_explicitly() {
    let s = stack();
    let coordinator = TransactionCoordinator::new();

    // Authorize inside a grouped flow whose later step fails; the coordinator
    // cannot reverse the authorization itself, so the call site compensates.
    let payments = s.payments.clone();
    let result: Result<(), PaymentError> = coordinator
        .with_transaction(|_ctx| async {
            let payment = payments.create_payment(charge(5000, false)).await?;
            coordinator.record_operation("authorize", json!({ "payment_id": payment.id }));
            Err(PaymentError::Validation {
                field: "shipment".into(),
                message: "no inventory".into(),
            })
        })
        .await;
    assert!(result.is_err());
    assert_eq!(coordinator.audit_log()[0].event, "ROLLED_BACK");

    // The authorization survived the logical rollback; void it explicitly.
    let orphaned = s
        .payments
        .list_payments(PaymentFilter::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(orphaned[0].status, PaymentStatus::Authorized);

    let cancelled = s.payments.cancel_payment(orphaned[0].id).await.unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);
}
