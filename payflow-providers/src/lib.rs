//! # Payflow Providers
//!
//! Gateway adapters implementing the `ProviderGateway` port, one per
//! provider. Credentials and environment selection are supplied by the
//! startup layer through each adapter's config struct.

use std::sync::Arc;

use payflow_types::GatewayRegistry;

mod card_network;
mod wallet;

pub use card_network::{CardNetworkConfig, CardNetworkGateway};
pub use wallet::{WalletConfig, WalletGateway};

/// Builds a registry wired with both sandbox adapters.
pub fn sandbox_registry() -> GatewayRegistry {
    GatewayRegistry::new(
        Arc::new(CardNetworkGateway::new(CardNetworkConfig::default())),
        Arc::new(WalletGateway::new(WalletConfig::default())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_types::ProviderKind;

    #[test]
    fn test_registry_dispatches_by_kind() {
        let registry = sandbox_registry();
        assert_eq!(
            registry.for_provider(ProviderKind::CardNetwork).kind(),
            ProviderKind::CardNetwork
        );
        assert_eq!(
            registry.for_provider(ProviderKind::Wallet).kind(),
            ProviderKind::Wallet
        );
    }
}
