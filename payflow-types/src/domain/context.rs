//! Transaction context records for the coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a coordinator context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionContextId(Uuid);

impl TransactionContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TransactionContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a grouped logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One operation recorded inside an active context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub op_type: String,
    pub data: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Ephemeral grouping record for one logical multi-step operation.
///
/// Exists only while the operation runs; the coordinator owns exactly one
/// active context at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionContext {
    pub id: TransactionContextId,
    pub state: TransactionState,
    pub started_at: DateTime<Utc>,
    pub operations: Vec<OperationRecord>,
}

impl TransactionContext {
    /// Creates a new active context.
    pub fn new() -> Self {
        Self {
            id: TransactionContextId::new(),
            state: TransactionState::Active,
            started_at: Utc::now(),
            operations: Vec::new(),
        }
    }

    /// Appends an operation to the context's ordered log.
    pub fn record(&mut self, op_type: impl Into<String>, data: Value) {
        self.operations.push(OperationRecord {
            op_type: op_type.into(),
            data,
            recorded_at: Utc::now(),
        });
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only audit entry written when a context closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub context_id: TransactionContextId,
    pub event: String,
    pub data: Value,
    pub logged_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(context_id: TransactionContextId, event: impl Into<String>, data: Value) -> Self {
        Self {
            context_id,
            event: event.into(),
            data,
            logged_at: Utc::now(),
        }
    }
}
