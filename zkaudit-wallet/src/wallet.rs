//! Wallet abstraction used by the sync orchestrator and the pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::keys::WalletSeed;
use crate::network::{Endpoints, NetworkId};
use crate::transaction::{BalancedTransaction, CoinInfo, TxReceipt, WalletTransaction};

/// Progress of the wallet's background synchronization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub synced: bool,
    /// Blocks the wallet still trails the indexer by.
    pub lag: u64,
}

/// Point-in-time view of a wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    pub address: String,
    pub coin_public_key: String,
    pub encryption_public_key: String,
    /// Token type to total value.
    pub balances: BTreeMap<String, u64>,
    pub available_coins: Vec<CoinInfo>,
    pub pending_coins: Vec<CoinInfo>,
    pub sync_progress: Option<SyncProgress>,
}

impl WalletState {
    /// Usable once it holds any balance or reports itself fully synced.
    pub fn is_usable(&self) -> bool {
        !self.balances.is_empty() || self.sync_progress.map_or(false, |p| p.synced)
    }

    pub fn is_synced(&self) -> bool {
        self.sync_progress.map_or(false, |p| p.synced)
    }

    pub fn total_coins(&self) -> usize {
        self.available_coins.len() + self.pending_coins.len()
    }
}

/// A running wallet client.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Start background synchronization. Idempotent.
    async fn start(&self) -> Result<(), WalletError>;

    /// Latest known state.
    async fn state(&self) -> Result<WalletState, WalletError>;

    /// Add inputs and change so the transaction pays its fee. `new_coins` are
    /// coins the transaction creates for this wallet; they are tracked as pending.
    async fn balance_transaction(
        &self,
        tx: WalletTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<WalletTransaction, WalletError>;

    async fn prove_transaction(&self, tx: WalletTransaction) -> Result<WalletTransaction, WalletError>;

    /// Submit and wait until the transaction is included in a block.
    async fn submit_transaction(&self, tx: BalancedTransaction) -> Result<TxReceipt, WalletError>;

    /// Stop background work.
    async fn close(&self) -> Result<(), WalletError>;
}

/// Builds wallet clients bound to a set of endpoints.
#[async_trait]
pub trait WalletBuilder: Send + Sync {
    async fn build(
        &self,
        endpoints: &Endpoints,
        seed: &WalletSeed,
        network_id: NetworkId,
    ) -> Result<Arc<dyn Wallet>, WalletError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_on_balance_or_sync_flag() {
        let mut state = WalletState::default();
        assert!(!state.is_usable());

        state.sync_progress = Some(SyncProgress { synced: false, lag: 3 });
        assert!(!state.is_usable());

        state.sync_progress = Some(SyncProgress { synced: true, lag: 0 });
        assert!(state.is_usable());

        let funded = WalletState {
            balances: BTreeMap::from([("00".to_string(), 5)]),
            ..WalletState::default()
        };
        assert!(funded.is_usable());
    }
}
