//! Balance, prove and submit.
//!
//! A pipeline owns one wallet and runs at most one transaction at a time.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::error::WalletError;
use crate::network::NetworkId;
use crate::transaction::{BalancedTransaction, CoinInfo, TxReceipt, UnbalancedTransaction, WalletTransaction};
use crate::wallet::Wallet;

/// Turns unbalanced contract calls into included transactions.
pub struct TransactionPipeline {
    wallet: Arc<dyn Wallet>,
    network_id: NetworkId,
    in_flight: Mutex<()>,
}

impl TransactionPipeline {
    pub fn new(wallet: Arc<dyn Wallet>, network_id: NetworkId) -> Self {
        Self {
            wallet,
            network_id,
            in_flight: Mutex::new(()),
        }
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }

    /// Balance and prove `tx` against the wallet's coins.
    pub async fn balance(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction, WalletError> {
        let _guard = self.in_flight.lock().await;
        self.balance_locked(tx, new_coins).await
    }

    /// Submit a balanced transaction and wait for inclusion. Not retried.
    pub async fn submit(&self, tx: BalancedTransaction) -> Result<TxReceipt, WalletError> {
        let _guard = self.in_flight.lock().await;
        self.submit_locked(tx).await
    }

    /// Balance, prove and submit while holding the pipeline for the whole run.
    #[instrument(skip_all, fields(network = %self.network_id, fee = tx.fee()))]
    pub async fn balance_and_submit(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<TxReceipt, WalletError> {
        let _guard = self.in_flight.lock().await;
        let balanced = self.balance_locked(tx, new_coins).await?;
        self.submit_locked(balanced).await
    }

    async fn balance_locked(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction, WalletError> {
        let bytes = tx.serialize()?;
        let wallet_tx = WalletTransaction::from_ledger_bytes(&bytes, self.network_id)?;

        let balanced = self.wallet.balance_transaction(wallet_tx, new_coins).await?;
        let proved = self.wallet.prove_transaction(balanced).await?;
        BalancedTransaction::from_wallet(&proved)
    }

    async fn submit_locked(&self, tx: BalancedTransaction) -> Result<TxReceipt, WalletError> {
        let tx_id = tx.tx_id().to_string();
        let receipt = self.wallet.submit_transaction(tx).await?;
        info!(
            local_tx_id = %tx_id,
            tx_id = %receipt.tx_id,
            block_height = receipt.block_height,
            "transaction included"
        );
        Ok(receipt)
    }
}
