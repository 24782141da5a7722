//! In-memory repository adapter.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use payflow_types::{
    LedgerRepository, Page, Payment, PaymentFilter, PaymentId, ProviderKind, RecordedEvent,
    Refund, RefundFilter, RefundId, RepoError, WebhookEvent, WebhookEventId,
};

// ─────────────────────────────────────────────────────────────────────────────
// In-memory repository
// ─────────────────────────────────────────────────────────────────────────────

/// Thread-safe in-memory store for payments, refunds, and webhook events.
///
/// Upholds the port's atomicity contract through dashmap entry locking:
/// version-checked updates hold the entry lock for the whole compare-and-swap,
/// and webhook recording holds the dedup-index entry lock across the
/// insert-if-absent decision.
#[derive(Default)]
pub struct MemoryRepo {
    payments: DashMap<PaymentId, Payment>,
    payments_by_idem: DashMap<String, PaymentId>,
    refunds: DashMap<RefundId, Refund>,
    webhook_events: DashMap<WebhookEventId, WebhookEvent>,
    webhook_index: DashMap<(ProviderKind, String), WebhookEventId>,
}

impl MemoryRepo {
    /// Creates a new, empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> Vec<T> {
    let offset = page.offset.min(items.len());
    let mut items = items.split_off(offset);
    items.truncate(page.limit);
    items
}

#[async_trait]
impl LedgerRepository for MemoryRepo {
    async fn insert_payment(&self, mut payment: Payment) -> Result<Payment, RepoError> {
        if let Some(key) = payment.idempotency_key.clone() {
            match self.payments_by_idem.entry(key) {
                Entry::Occupied(existing) => {
                    return Err(RepoError::Duplicate {
                        entity: "payment",
                        key: existing.key().clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(payment.id);
                }
            }
        }
        payment.version = 1;
        self.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn update_payment(&self, mut payment: Payment) -> Result<Payment, RepoError> {
        let mut stored = self
            .payments
            .get_mut(&payment.id)
            .ok_or(RepoError::NotFound)?;
        if stored.version != payment.version {
            return Err(RepoError::Conflict {
                entity: "payment",
                id: payment.id.to_string(),
            });
        }
        payment.version += 1;
        *stored = payment.clone();
        Ok(payment)
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError> {
        Ok(self.payments.get(&id).map(|p| p.clone()))
    }

    async fn find_payment_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Payment>, RepoError> {
        let Some(id) = self.payments_by_idem.get(key).map(|id| *id) else {
            return Ok(None);
        };
        // The key claim becomes visible momentarily before the payment row;
        // report absence rather than erroring.
        Ok(self.payments.get(&id).map(|p| p.clone()))
    }

    async fn find_payment_by_provider_tx(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Payment>, RepoError> {
        Ok(self
            .payments
            .iter()
            .find(|p| {
                p.provider_transaction_id.as_deref() == Some(provider_transaction_id)
            })
            .map(|p| p.clone()))
    }

    async fn list_payments(
        &self,
        filter: PaymentFilter,
        page: Page,
    ) -> Result<Vec<Payment>, RepoError> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| {
                filter
                    .customer_id
                    .as_deref()
                    .is_none_or(|c| p.customer_id == c)
                    && filter.order_id.as_deref().is_none_or(|o| p.order_id == o)
                    && filter.status.is_none_or(|s| p.status == s)
            })
            .map(|p| p.clone())
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.to_string().cmp(&a.id.to_string())));
        Ok(paginate(payments, page))
    }

    async fn insert_refund(&self, mut refund: Refund) -> Result<Refund, RepoError> {
        refund.version = 1;
        self.refunds.insert(refund.id, refund.clone());
        Ok(refund)
    }

    async fn update_refund(&self, mut refund: Refund) -> Result<Refund, RepoError> {
        let mut stored = self
            .refunds
            .get_mut(&refund.id)
            .ok_or(RepoError::NotFound)?;
        if stored.version != refund.version {
            return Err(RepoError::Conflict {
                entity: "refund",
                id: refund.id.to_string(),
            });
        }
        refund.version += 1;
        *stored = refund.clone();
        Ok(refund)
    }

    async fn get_refund(&self, id: RefundId) -> Result<Option<Refund>, RepoError> {
        Ok(self.refunds.get(&id).map(|r| r.clone()))
    }

    async fn find_refund_by_provider_refund(
        &self,
        provider_refund_id: &str,
    ) -> Result<Option<Refund>, RepoError> {
        Ok(self
            .refunds
            .iter()
            .find(|r| r.provider_refund_id.as_deref() == Some(provider_refund_id))
            .map(|r| r.clone()))
    }

    async fn list_refunds(
        &self,
        filter: RefundFilter,
        page: Page,
    ) -> Result<Vec<Refund>, RepoError> {
        let mut refunds: Vec<Refund> = self
            .refunds
            .iter()
            .filter(|r| {
                filter.payment_id.is_none_or(|id| r.payment_id == id)
                    && filter.status.is_none_or(|s| r.status == s)
            })
            .map(|r| r.clone())
            .collect();
        refunds.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.to_string().cmp(&a.id.to_string())));
        Ok(paginate(refunds, page))
    }

    async fn record_webhook_event(
        &self,
        mut event: WebhookEvent,
    ) -> Result<RecordedEvent, RepoError> {
        let key = (event.provider, event.provider_event_id.clone());
        match self.webhook_index.entry(key) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                let stored = self
                    .webhook_events
                    .get(&id)
                    .map(|e| e.clone())
                    .ok_or_else(|| RepoError::Storage("webhook index out of sync".into()))?;
                Ok(RecordedEvent::Duplicate(stored))
            }
            Entry::Vacant(slot) => {
                event.version = 1;
                slot.insert(event.id);
                self.webhook_events.insert(event.id, event.clone());
                Ok(RecordedEvent::Fresh(event))
            }
        }
    }

    async fn update_webhook_event(
        &self,
        mut event: WebhookEvent,
    ) -> Result<WebhookEvent, RepoError> {
        let mut stored = self
            .webhook_events
            .get_mut(&event.id)
            .ok_or(RepoError::NotFound)?;
        if stored.version != event.version {
            return Err(RepoError::Conflict {
                entity: "webhook_event",
                id: event.id.to_string(),
            });
        }
        event.version += 1;
        *stored = event.clone();
        Ok(event)
    }

    async fn get_webhook_event(
        &self,
        id: WebhookEventId,
    ) -> Result<Option<WebhookEvent>, RepoError> {
        Ok(self.webhook_events.get(&id).map(|e| e.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_types::{Currency, ProviderKind, RefundReason};
    use serde_json::{Map, json};

    fn payment(customer: &str) -> Payment {
        Payment::new(
            1000,
            Currency::parse("USD").unwrap(),
            customer.into(),
            "ord_1".into(),
            ProviderKind::CardNetwork,
            None,
            Map::new(),
            None,
        )
    }

    #[tokio::test]
    async fn test_insert_sets_version() {
        let repo = MemoryRepo::new();
        let stored = repo.insert_payment(payment("cus_1")).await.unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let repo = MemoryRepo::new();
        let stored = repo.insert_payment(payment("cus_1")).await.unwrap();

        let first = repo.get_payment(stored.id).await.unwrap().unwrap();
        let second = repo.get_payment(stored.id).await.unwrap().unwrap();

        let mut winner = first;
        winner.capture(None).unwrap();
        repo.update_payment(winner).await.unwrap();

        let mut loser = second;
        loser.capture(None).unwrap();
        let result = repo.update_payment(loser).await;
        assert!(matches!(result, Err(RepoError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_idempotency_key_claimed_once() {
        let repo = MemoryRepo::new();
        let mut first = payment("cus_1");
        first.idempotency_key = Some("key_1".into());
        let mut second = payment("cus_1");
        second.idempotency_key = Some("key_1".into());

        let stored = repo.insert_payment(first).await.unwrap();
        let result = repo.insert_payment(second).await;
        assert!(matches!(result, Err(RepoError::Duplicate { .. })));

        let found = repo
            .find_payment_by_idempotency_key("key_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, stored.id);
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let repo = MemoryRepo::new();
        let a = repo.insert_payment(payment("cus_1")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let b = repo.insert_payment(payment("cus_1")).await.unwrap();

        let listed = repo
            .list_payments(PaymentFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);

        let page = repo
            .list_payments(
                PaymentFilter::default(),
                Page {
                    limit: 1,
                    offset: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, a.id);
    }

    #[tokio::test]
    async fn test_filter_by_customer() {
        let repo = MemoryRepo::new();
        repo.insert_payment(payment("cus_1")).await.unwrap();
        repo.insert_payment(payment("cus_2")).await.unwrap();

        let listed = repo
            .list_payments(
                PaymentFilter {
                    customer_id: Some("cus_2".into()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].customer_id, "cus_2");
    }

    #[tokio::test]
    async fn test_webhook_dedup_by_provider_event_id() {
        let repo = MemoryRepo::new();
        let event = WebhookEvent::new(
            ProviderKind::CardNetwork,
            "evt_1",
            "payment.captured",
            json!({"id": "evt_1"}),
        );
        let replay = WebhookEvent::new(
            ProviderKind::CardNetwork,
            "evt_1",
            "payment.captured",
            json!({"id": "evt_1"}),
        );

        let first = repo.record_webhook_event(event).await.unwrap();
        assert!(matches!(first, RecordedEvent::Fresh(_)));

        let second = repo.record_webhook_event(replay).await.unwrap();
        match second {
            RecordedEvent::Duplicate(stored) => assert_eq!(stored.provider_event_id, "evt_1"),
            RecordedEvent::Fresh(_) => panic!("replay must not record a fresh event"),
        }
    }

    #[tokio::test]
    async fn test_same_event_id_different_provider_is_fresh() {
        let repo = MemoryRepo::new();
        let card = WebhookEvent::new(
            ProviderKind::CardNetwork,
            "evt_1",
            "payment.captured",
            json!({}),
        );
        let wallet = WebhookEvent::new(ProviderKind::Wallet, "evt_1", "payment.captured", json!({}));

        assert!(matches!(
            repo.record_webhook_event(card).await.unwrap(),
            RecordedEvent::Fresh(_)
        ));
        assert!(matches!(
            repo.record_webhook_event(wallet).await.unwrap(),
            RecordedEvent::Fresh(_)
        ));
    }

    #[tokio::test]
    async fn test_find_refund_by_provider_refund() {
        let repo = MemoryRepo::new();
        let payment = repo.insert_payment(payment("cus_1")).await.unwrap();
        let mut refund = Refund::new(
            payment.id,
            500,
            Currency::parse("USD").unwrap(),
            RefundReason::RequestedByCustomer,
            None,
            Map::new(),
        );
        refund.process("cnr_42".into()).unwrap();
        repo.insert_refund(refund.clone()).await.unwrap();

        let found = repo
            .find_refund_by_provider_refund("cnr_42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, refund.id);
        assert!(
            repo.find_refund_by_provider_refund("cnr_missing")
                .await
                .unwrap()
                .is_none()
        );
    }
}
