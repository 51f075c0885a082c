//! Public ledger state as seen through the indexer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use zkaudit_ledger::{ContractAddress, LedgerState};
use zkaudit_wallet::Indexer;

use crate::error::BridgeError;

/// Read access to deployed ledgers.
#[async_trait]
pub trait PublicDataProvider: Send + Sync {
    /// Ledger at `address`, or `None` when no contract is deployed there.
    async fn ledger_state(&self, address: &ContractAddress) -> Result<Option<LedgerState>, BridgeError>;
}

/// [`PublicDataProvider`] backed by the indexer's `contractAction` query.
#[derive(Clone)]
pub struct IndexerDataProvider {
    indexer: Arc<dyn Indexer>,
}

impl IndexerDataProvider {
    pub fn new(indexer: Arc<dyn Indexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl PublicDataProvider for IndexerDataProvider {
    async fn ledger_state(&self, address: &ContractAddress) -> Result<Option<LedgerState>, BridgeError> {
        let Some(bytes) = self.indexer.contract_state(&address.to_hex()).await? else {
            debug!(%address, "no contract state at address");
            return Ok(None);
        };
        let state = LedgerState::from_bytes(&bytes).map_err(|e| {
            BridgeError::Network(format!("indexer returned an invalid ledger for {address}: {e}"))
        })?;
        Ok(Some(state))
    }
}

/// Ledger at `address`, failing with `StateNotFound` when absent.
pub async fn require_ledger(
    provider: &dyn PublicDataProvider,
    address: &ContractAddress,
) -> Result<LedgerState, BridgeError> {
    provider
        .ledger_state(address)
        .await?
        .ok_or_else(|| BridgeError::StateNotFound(format!("no contract deployed at {address}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkaudit_test_fixtures::InMemoryNetwork;
    use zkaudit_wallet::NetworkId;

    #[tokio::test]
    async fn reads_deployed_ledger() {
        let network = Arc::new(InMemoryNetwork::new(NetworkId::Undeployed));
        let address = ContractAddress([4; 32]);
        network.insert_contract(&address.to_hex(), LedgerState::new());

        let provider = IndexerDataProvider::new(network);
        let state = require_ledger(&provider, &address).await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn missing_contract_is_state_not_found() {
        let provider = IndexerDataProvider::new(Arc::new(InMemoryNetwork::new(NetworkId::Undeployed)));
        let err = require_ledger(&provider, &ContractAddress([4; 32])).await.unwrap_err();
        assert_eq!(err.kind(), "StateNotFoundError");
    }
}
