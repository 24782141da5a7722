//! Port traits implemented by adapters.

mod gateway;
mod repository;

pub use gateway::{
    ALREADY_VOIDED, CaptureOutcome, ChargeOutcome, ChargeRequest, GatewayRegistry,
    ProviderGateway, ProviderTransaction, RefundOutcome, VoidOutcome,
};
pub use repository::{LedgerRepository, RecordedEvent};
