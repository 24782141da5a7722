use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payment::ProviderKind;

/// Local identifier for a recorded webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookEventId(Uuid);

impl WebhookEventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WebhookEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WebhookEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookStatus {
    #[default]
    Received,
    Processing,
    Processed,
    Failed,
    Ignored,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Failed => "FAILED",
            Self::Ignored => "IGNORED",
        }
    }
}

impl AsRef<str> for WebhookStatus {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A received provider event, retained indefinitely for idempotency and audit.
///
/// The provider-assigned `provider_event_id` is the dedup key; the local id
/// exists so the record can be referenced independently of the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    pub provider: ProviderKind,
    pub provider_event_id: String,
    pub event_type: String,
    pub status: WebhookStatus,
    pub payload: serde_json::Value,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by the store on every update
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn new(
        provider: ProviderKind,
        provider_event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: WebhookEventId::new(),
            provider,
            provider_event_id: provider_event_id.into(),
            event_type: event_type.into(),
            status: WebhookStatus::Received,
            payload,
            error_message: None,
            processed_at: None,
            version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn start_processing(&mut self) {
        self.status = WebhookStatus::Processing;
    }

    pub fn complete(&mut self) {
        self.status = WebhookStatus::Processed;
        self.processed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error_message: impl Into<String>) {
        self.status = WebhookStatus::Failed;
        self.error_message = Some(error_message.into());
        self.processed_at = Some(Utc::now());
    }

    pub fn ignore(&mut self, reason: impl Into<String>) {
        self.status = WebhookStatus::Ignored;
        self.error_message = Some(reason.into());
        self.processed_at = Some(Utc::now());
    }
}
