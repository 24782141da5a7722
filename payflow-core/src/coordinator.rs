//! Transaction coordinator.
//!
//! Groups a sequence of ledger/provider operations into one logical unit
//! with begin/commit/rollback semantics and an append-only audit log.
//!
//! Rollback is logical: it marks the context rolled back and logs it.
//! Provider side effects already sent (a charge, a capture) cannot be
//! reversed here - call sites issue compensating voids/refunds explicitly
//! when a later step fails after an earlier external effect.

use std::sync::Mutex;

use serde_json::{Value, json};
use tracing::{error, info, warn};

use payflow_types::{
    AuditRecord, CoordinatorError, PaymentError, TransactionContext, TransactionContextId,
    TransactionState,
};

/// Coordinates one grouped logical operation at a time.
///
/// Contexts are not thread-shared: one logical flow owns one context, and
/// `begin` while a context is active fails fast rather than nesting.
#[derive(Default)]
pub struct TransactionCoordinator {
    current: Mutex<Option<TransactionContext>>,
    audit_log: Mutex<Vec<AuditRecord>>,
}

impl TransactionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a context is active.
    pub fn in_transaction(&self) -> bool {
        self.current
            .lock()
            .expect("coordinator lock poisoned")
            .as_ref()
            .is_some_and(|ctx| ctx.state == TransactionState::Active)
    }

    /// Begins a new context. Fails if one is already active.
    pub fn begin(&self) -> Result<TransactionContextId, CoordinatorError> {
        let mut current = self.current.lock().expect("coordinator lock poisoned");
        if current
            .as_ref()
            .is_some_and(|ctx| ctx.state == TransactionState::Active)
        {
            return Err(CoordinatorError::AlreadyActive);
        }
        let ctx = TransactionContext::new();
        let id = ctx.id;
        info!(transaction_id = %id, "transaction started");
        *current = Some(ctx);
        Ok(id)
    }

    /// Commits the active context. Fails if none is active.
    pub fn commit(&self) -> Result<(), CoordinatorError> {
        let mut ctx = self.take_active()?;
        ctx.state = TransactionState::Committed;
        info!(
            transaction_id = %ctx.id,
            operations = ctx.operations.len(),
            "transaction committed"
        );
        self.log_event(
            ctx.id,
            "COMMITTED",
            json!({ "operations_count": ctx.operations.len() }),
        );
        Ok(())
    }

    /// Rolls back the active context. Fails if none is active.
    pub fn rollback(&self, reason: Option<&str>) -> Result<(), CoordinatorError> {
        let mut ctx = self.take_active()?;
        ctx.state = TransactionState::RolledBack;
        warn!(
            transaction_id = %ctx.id,
            reason = ?reason,
            operations = ctx.operations.len(),
            "transaction rolled back"
        );
        self.log_event(
            ctx.id,
            "ROLLED_BACK",
            json!({
                "reason": reason,
                "operations_count": ctx.operations.len(),
            }),
        );
        Ok(())
    }

    /// Records an operation inside the active context.
    ///
    /// Outside a context the operation is logged and dropped rather than
    /// failing the caller.
    pub fn record_operation(&self, op_type: &str, data: Value) {
        let mut current = self.current.lock().expect("coordinator lock poisoned");
        match current
            .as_mut()
            .filter(|ctx| ctx.state == TransactionState::Active)
        {
            Some(ctx) => ctx.record(op_type, data),
            None => {
                warn!(op_type, "operation recorded outside transaction");
            }
        }
    }

    /// Snapshot of the append-only audit log.
    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit_log
            .lock()
            .expect("coordinator lock poisoned")
            .clone()
    }

    /// Runs `f` inside a context: commits on success, rolls back (logging
    /// the triggering error) on failure. The context is closed on every
    /// exit path.
    pub async fn with_transaction<T, F, Fut>(&self, f: F) -> Result<T, PaymentError>
    where
        F: FnOnce(TransactionContextId) -> Fut,
        Fut: Future<Output = Result<T, PaymentError>>,
    {
        let id = self.begin()?;
        match f(id).await {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                error!(transaction_id = %id, error = %err, "transaction failed, rolling back");
                self.rollback(Some(&err.to_string()))?;
                Err(err)
            }
        }
    }

    fn take_active(&self) -> Result<TransactionContext, CoordinatorError> {
        let mut current = self.current.lock().expect("coordinator lock poisoned");
        match current.take() {
            Some(ctx) if ctx.state == TransactionState::Active => Ok(ctx),
            other => {
                *current = other;
                Err(CoordinatorError::NotActive)
            }
        }
    }

    fn log_event(&self, context_id: TransactionContextId, event: &str, data: Value) {
        self.audit_log
            .lock()
            .expect("coordinator lock poisoned")
            .push(AuditRecord::new(context_id, event, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_types::{PaymentError, ProviderKind};

    #[test]
    fn test_begin_commit() {
        let coordinator = TransactionCoordinator::new();
        assert!(!coordinator.in_transaction());

        coordinator.begin().unwrap();
        assert!(coordinator.in_transaction());

        coordinator.record_operation("charge", json!({ "amount": 1000 }));
        coordinator.commit().unwrap();
        assert!(!coordinator.in_transaction());

        let log = coordinator.audit_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event, "COMMITTED");
        assert_eq!(log[0].data["operations_count"], 1);
    }

    #[test]
    fn test_begin_while_active_fails() {
        let coordinator = TransactionCoordinator::new();
        coordinator.begin().unwrap();
        assert!(matches!(
            coordinator.begin(),
            Err(CoordinatorError::AlreadyActive)
        ));
    }

    #[test]
    fn test_commit_without_begin_fails() {
        let coordinator = TransactionCoordinator::new();
        assert!(matches!(
            coordinator.commit(),
            Err(CoordinatorError::NotActive)
        ));
        assert!(matches!(
            coordinator.rollback(None),
            Err(CoordinatorError::NotActive)
        ));
    }

    #[test]
    fn test_rollback_logs_reason() {
        let coordinator = TransactionCoordinator::new();
        coordinator.begin().unwrap();
        coordinator.rollback(Some("provider timeout")).unwrap();

        let log = coordinator.audit_log();
        assert_eq!(log[0].event, "ROLLED_BACK");
        assert_eq!(log[0].data["reason"], "provider timeout");
    }

    #[test]
    fn test_record_outside_transaction_is_dropped() {
        let coordinator = TransactionCoordinator::new();
        coordinator.record_operation("charge", json!({}));

        coordinator.begin().unwrap();
        coordinator.commit().unwrap();
        assert_eq!(coordinator.audit_log()[0].data["operations_count"], 0);
    }

    #[tokio::test]
    async fn test_with_transaction_commits_on_success() {
        let coordinator = TransactionCoordinator::new();
        let result = coordinator
            .with_transaction(|_id| async { Ok::<_, PaymentError>(42) })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(coordinator.audit_log()[0].event, "COMMITTED");
        assert!(!coordinator.in_transaction());
    }

    #[tokio::test]
    async fn test_with_transaction_rolls_back_on_error() {
        let coordinator = TransactionCoordinator::new();
        let result: Result<(), _> = coordinator
            .with_transaction(|_id| async {
                Err(PaymentError::ProviderTimeout {
                    provider: ProviderKind::CardNetwork,
                    timeout_ms: 5000,
                })
            })
            .await;

        assert!(matches!(result, Err(PaymentError::ProviderTimeout { .. })));
        assert_eq!(coordinator.audit_log()[0].event, "ROLLED_BACK");
        // Closed on the error path too; a new transaction can begin.
        coordinator.begin().unwrap();
        coordinator.commit().unwrap();
    }
}
