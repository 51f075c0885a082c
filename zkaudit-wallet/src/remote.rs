//! Wallet backed by the indexer, proof server and node.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::indexer::{Indexer, IndexerClient};
use crate::keys::{WalletKeys, WalletSeed};
use crate::network::{Endpoints, NetworkId};
use crate::node::{NodeClient, TransactionSubmitter};
use crate::proof_server::{ProofServerClient, Prover};
use crate::sync::{poll_until, PollSchedule};
use crate::transaction::{BalancedTransaction, CoinInfo, TxReceipt, WalletTransaction};
use crate::wallet::{Wallet, WalletBuilder, WalletState};

/// How often the background task refreshes wallet state.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Wait for a submitted transaction to appear in a block.
pub fn default_finality_schedule() -> PollSchedule {
    PollSchedule {
        grace: Duration::ZERO,
        interval: Duration::from_secs(2),
        max_attempts: 60,
    }
}

/// Network-backed wallet with a background refresh task.
pub struct RemoteWallet {
    keys: WalletKeys,
    network_id: NetworkId,
    indexer: Arc<dyn Indexer>,
    prover: Arc<dyn Prover>,
    submitter: Arc<dyn TransactionSubmitter>,
    state: Arc<RwLock<WalletState>>,
    /// Nonces consumed by balanced but not yet confirmed transactions.
    spent: Arc<Mutex<HashSet<[u8; 32]>>>,
    started: AtomicBool,
    cancel: CancellationToken,
    refresh_interval: Duration,
    finality: PollSchedule,
}

impl RemoteWallet {
    pub fn new(
        seed: &WalletSeed,
        network_id: NetworkId,
        indexer: Arc<dyn Indexer>,
        prover: Arc<dyn Prover>,
        submitter: Arc<dyn TransactionSubmitter>,
    ) -> Self {
        let keys = WalletKeys::from_seed(seed);
        let state = WalletState {
            address: keys.address(),
            coin_public_key: keys.coin_public_key.clone(),
            encryption_public_key: keys.encryption_public_key.clone(),
            ..WalletState::default()
        };
        Self {
            keys,
            network_id,
            indexer,
            prover,
            submitter,
            state: Arc::new(RwLock::new(state)),
            spent: Arc::new(Mutex::new(HashSet::new())),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            finality: default_finality_schedule(),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_finality_schedule(mut self, schedule: PollSchedule) -> Self {
        self.finality = schedule;
        self
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    /// Pull the latest coin state from the indexer once.
    pub async fn refresh(&self) -> Result<(), WalletError> {
        refresh_state(
            self.indexer.as_ref(),
            &self.keys.coin_public_key,
            &self.state,
            &self.spent,
        )
        .await
    }
}

async fn refresh_state(
    indexer: &dyn Indexer,
    coin_public_key: &str,
    state: &RwLock<WalletState>,
    spent: &Mutex<HashSet<[u8; 32]>>,
) -> Result<(), WalletError> {
    let Some(indexed) = indexer.wallet_state(coin_public_key).await? else {
        return Ok(());
    };
    let mut guard = state.write().await;
    let spent = spent.lock().await;
    guard.balances = indexed.balances;
    guard.available_coins = indexed
        .available_coins
        .into_iter()
        .filter(|c| !spent.contains(&c.nonce))
        .collect();
    for coin in indexed.pending_coins {
        if !guard.pending_coins.iter().any(|p| p.nonce == coin.nonce) {
            guard.pending_coins.push(coin);
        }
    }
    guard.sync_progress = Some(indexed.sync_progress);
    Ok(())
}

/// Pick native coins, largest first, until `required` is covered.
fn select_coins(available: &[CoinInfo], required: u64) -> Result<(Vec<CoinInfo>, u64), WalletError> {
    let mut candidates: Vec<&CoinInfo> = available.iter().filter(|c| c.is_native()).collect();
    candidates.sort_by(|a, b| b.value.cmp(&a.value));

    let mut selected = Vec::new();
    let mut total: u64 = 0;
    for coin in candidates {
        if total >= required {
            break;
        }
        total = total.saturating_add(coin.value);
        selected.push(coin.clone());
    }

    if total < required {
        return Err(WalletError::InsufficientFunds {
            required,
            available: total,
        });
    }
    Ok((selected, total - required))
}

#[async_trait]
impl Wallet for RemoteWallet {
    async fn start(&self) -> Result<(), WalletError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let indexer = Arc::clone(&self.indexer);
        let state = Arc::clone(&self.state);
        let spent = Arc::clone(&self.spent);
        let key = self.keys.coin_public_key.clone();
        let cancel = self.cancel.clone();
        let interval = self.refresh_interval;

        tokio::spawn(async move {
            loop {
                if let Err(e) = refresh_state(indexer.as_ref(), &key, &state, &spent).await {
                    warn!(error = %e, "wallet refresh failed");
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("wallet refresh task stopped");
        });

        info!(address = %self.keys.address(), network = %self.network_id, "wallet sync started");
        Ok(())
    }

    async fn state(&self) -> Result<WalletState, WalletError> {
        Ok(self.state.read().await.clone())
    }

    async fn balance_transaction(
        &self,
        mut tx: WalletTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<WalletTransaction, WalletError> {
        if tx.network_id != self.network_id {
            return Err(WalletError::NetworkIdMismatch {
                expected: self.network_id,
                actual: tx.network_id,
            });
        }

        let surplus = tx.native_surplus();
        let required = i128::from(tx.fee) - surplus;
        if required <= 0 {
            return Ok(tx);
        }
        let required = u64::try_from(required)
            .map_err(|_| WalletError::Validation("transaction fee overflows u64".into()))?;

        let mut state = self.state.write().await;
        let (selected, change) = select_coins(&state.available_coins, required)?;

        let mut spent = self.spent.lock().await;
        for coin in &selected {
            spent.insert(coin.nonce);
        }
        state.available_coins.retain(|c| !spent.contains(&c.nonce));

        if change > 0 {
            let change_coin = CoinInfo::native(change);
            state.pending_coins.push(change_coin.clone());
            tx.outputs.push(change_coin);
        }
        state.pending_coins.extend(new_coins);
        tx.inputs.extend(selected);

        debug!(fee = tx.fee, inputs = tx.inputs.len(), change, "balanced transaction");
        Ok(tx)
    }

    async fn prove_transaction(&self, mut tx: WalletTransaction) -> Result<WalletTransaction, WalletError> {
        let payload = tx.proving_payload()?;
        tx.proof = Some(self.prover.prove(payload).await?);
        Ok(tx)
    }

    async fn submit_transaction(&self, tx: BalancedTransaction) -> Result<TxReceipt, WalletError> {
        if tx.network_id() != self.network_id {
            return Err(WalletError::NetworkIdMismatch {
                expected: self.network_id,
                actual: tx.network_id(),
            });
        }

        let hash = self.submitter.submit(tx.as_bytes()).await?;
        info!(tx_id = %hash, "transaction submitted, awaiting inclusion");

        let indexer = Arc::clone(&self.indexer);
        let info = poll_until(&self.finality, &self.cancel, |_| {
            let indexer = Arc::clone(&indexer);
            let hash = hash.clone();
            async move { indexer.transaction(&hash).await }
        })
        .await
        .map_err(|e| match e {
            WalletError::SyncTimeout { attempts } => WalletError::Submission(format!(
                "transaction {hash} not included after {attempts} checks"
            )),
            other => other,
        })?;

        if !info.apply_stage.is_empty() && info.apply_stage != crate::indexer::APPLY_STAGE_SUCCESS {
            return Err(WalletError::Submission(format!(
                "transaction {hash} failed with apply stage {}",
                info.apply_stage
            )));
        }

        Ok(TxReceipt {
            tx_id: hash,
            block_height: info.block.height,
        })
    }

    async fn close(&self) -> Result<(), WalletError> {
        self.cancel.cancel();
        Ok(())
    }
}

impl Drop for RemoteWallet {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Builds [`RemoteWallet`]s over HTTP clients for the given endpoints.
#[derive(Clone, Debug, Default)]
pub struct RemoteWalletBuilder;

#[async_trait]
impl WalletBuilder for RemoteWalletBuilder {
    async fn build(
        &self,
        endpoints: &Endpoints,
        seed: &WalletSeed,
        network_id: NetworkId,
    ) -> Result<Arc<dyn Wallet>, WalletError> {
        let wallet = RemoteWallet::new(
            seed,
            network_id,
            Arc::new(IndexerClient::new(endpoints.indexer.clone())),
            Arc::new(ProofServerClient::new(endpoints.proof_server.clone())),
            Arc::new(NodeClient::new(endpoints.node.clone())),
        );
        Ok(Arc::new(wallet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(value: u64, n: u8) -> CoinInfo {
        CoinInfo {
            nonce: [n; 32],
            token_type: crate::transaction::NATIVE_TOKEN.to_string(),
            value,
        }
    }

    #[test]
    fn selects_largest_coins_first() {
        let available = vec![coin(100, 1), coin(700, 2), coin(400, 3)];
        let (selected, change) = select_coins(&available, 1_000).unwrap();
        assert_eq!(selected.iter().map(|c| c.value).collect::<Vec<_>>(), vec![700, 400]);
        assert_eq!(change, 100);
    }

    #[test]
    fn ignores_non_native_coins() {
        let mut other = coin(10_000, 9);
        other.token_type = "01".repeat(32);
        let err = select_coins(&[other, coin(5, 1)], 100).unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientFunds {
                required: 100,
                available: 5
            }
        ));
    }
}
