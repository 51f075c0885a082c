//! In-memory stand-in for the indexer, proof server and node.
//!
//! Submitted transactions are decoded, their contract action applied, and the
//! result recorded in a new block. Failed actions are included with a failed
//! apply stage, as a real chain would.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use zkaudit_ledger::{ContractAction, LedgerState, ResubmissionPolicy};
use zkaudit_wallet::indexer::APPLY_STAGE_SUCCESS;
use zkaudit_wallet::transaction::transaction_id;
use zkaudit_wallet::{
    BlockInfo, CoinInfo, IndexedWallet, Indexer, NetworkId, Prover, SyncProgress, TransactionInfo,
    TransactionStatus, TransactionSubmitter, WalletError, WalletTransaction, NATIVE_TOKEN,
};

/// Apply stage recorded when a contract action is rejected.
pub const APPLY_STAGE_FAILURE: &str = "FailEntirely";

/// Coins every wallet starts with.
pub const COINS_PER_WALLET: u8 = 16;
/// Value of each starting coin.
pub const COIN_VALUE: u64 = 100_000;

const GENESIS_TIMESTAMP_MS: u64 = 1_700_000_000_000;
const BLOCK_TIME_MS: u64 = 6_000;

#[derive(Clone, Debug)]
struct Block {
    info: BlockInfo,
    transactions: Vec<TransactionStatus>,
}

#[derive(Default)]
struct ChainState {
    blocks: Vec<Block>,
    contracts: HashMap<String, LedgerState>,
    transactions: HashMap<String, TransactionInfo>,
}

impl ChainState {
    fn push_block(&mut self, transactions: Vec<TransactionStatus>) -> BlockInfo {
        let height = self.blocks.len() as u64;
        let hash = blake3::hash(&height.to_le_bytes()).to_hex().to_string();
        let info = BlockInfo {
            height,
            hash,
            timestamp: GENESIS_TIMESTAMP_MS + height * BLOCK_TIME_MS,
        };
        self.blocks.push(Block {
            info: info.clone(),
            transactions,
        });
        info
    }
}

/// Shared in-memory chain. Wrap in an `Arc` and hand it out as every collaborator.
pub struct InMemoryNetwork {
    network_id: NetworkId,
    policy: ResubmissionPolicy,
    chain: Mutex<ChainState>,
    /// Wallet-state polls answered as "not yet synced" before funds appear.
    sync_delay: AtomicU32,
    /// When set, every wallet-state poll reports unsynced and empty.
    never_sync: bool,
    reject_submissions: Mutex<Option<String>>,
}

impl InMemoryNetwork {
    pub fn new(network_id: NetworkId) -> Self {
        let mut chain = ChainState::default();
        chain.push_block(Vec::new());
        Self {
            network_id,
            policy: ResubmissionPolicy::default(),
            chain: Mutex::new(chain),
            sync_delay: AtomicU32::new(0),
            never_sync: false,
            reject_submissions: Mutex::new(None),
        }
    }

    pub fn with_policy(mut self, policy: ResubmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report unsynced for the first `polls` wallet-state queries.
    pub fn with_sync_delay(self, polls: u32) -> Self {
        self.sync_delay.store(polls, Ordering::SeqCst);
        self
    }

    /// Wallets never become usable.
    pub fn never_syncing(mut self) -> Self {
        self.never_sync = true;
        self
    }

    /// Make the node reject every submission with `reason`.
    pub fn reject_submissions(&self, reason: impl Into<String>) {
        if let Ok(mut guard) = self.reject_submissions.lock() {
            *guard = Some(reason.into());
        }
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    /// Current ledger at `address` (hex, no prefix).
    pub fn contract(&self, address: &str) -> Option<LedgerState> {
        self.chain.lock().ok()?.contracts.get(address).cloned()
    }

    /// Install a ledger directly, bypassing transactions.
    pub fn insert_contract(&self, address: &str, state: LedgerState) {
        if let Ok(mut chain) = self.chain.lock() {
            chain.contracts.insert(address.to_string(), state);
        }
    }

    /// Append a block holding transactions with the given apply stages.
    pub fn push_block(&self, apply_stages: &[&str]) -> Option<BlockInfo> {
        let transactions = apply_stages
            .iter()
            .enumerate()
            .map(|(i, stage)| TransactionStatus {
                hash: format!("{:064x}", i),
                apply_stage: stage.to_string(),
            })
            .collect();
        Some(self.chain.lock().ok()?.push_block(transactions))
    }

    pub fn height(&self) -> u64 {
        self.chain
            .lock()
            .map(|c| c.blocks.len().saturating_sub(1) as u64)
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ChainState>, WalletError> {
        self.chain
            .lock()
            .map_err(|_| WalletError::Network("in-memory chain lock poisoned".into()))
    }

    fn funded_wallet(coin_public_key: &str) -> IndexedWallet {
        let coins: Vec<CoinInfo> = (0..COINS_PER_WALLET)
            .map(|i| {
                let mut hasher = blake3::Hasher::new();
                hasher.update(coin_public_key.as_bytes());
                hasher.update(&[i]);
                CoinInfo {
                    nonce: *hasher.finalize().as_bytes(),
                    token_type: NATIVE_TOKEN.to_string(),
                    value: COIN_VALUE,
                }
            })
            .collect();
        IndexedWallet {
            balances: BTreeMap::from([(
                NATIVE_TOKEN.to_string(),
                COIN_VALUE * u64::from(COINS_PER_WALLET),
            )]),
            available_coins: coins,
            pending_coins: Vec::new(),
            sync_progress: SyncProgress { synced: true, lag: 0 },
        }
    }
}

#[async_trait]
impl Indexer for InMemoryNetwork {
    async fn latest_block(&self) -> Result<BlockInfo, WalletError> {
        let chain = self.lock()?;
        chain
            .blocks
            .last()
            .map(|b| b.info.clone())
            .ok_or_else(|| WalletError::Network("no blocks".into()))
    }

    async fn block_transactions(&self, height: u64) -> Result<Vec<TransactionStatus>, WalletError> {
        let chain = self.lock()?;
        Ok(chain
            .blocks
            .get(height as usize)
            .map(|b| b.transactions.clone())
            .unwrap_or_default())
    }

    async fn transaction(&self, hash: &str) -> Result<Option<TransactionInfo>, WalletError> {
        Ok(self.lock()?.transactions.get(hash).cloned())
    }

    async fn contract_state(&self, address: &str) -> Result<Option<Vec<u8>>, WalletError> {
        let chain = self.lock()?;
        chain
            .contracts
            .get(address)
            .map(|state| state.to_bytes().map_err(|e| WalletError::Encoding(e.to_string())))
            .transpose()
    }

    async fn wallet_state(&self, coin_public_key: &str) -> Result<Option<IndexedWallet>, WalletError> {
        if self.never_sync {
            return Ok(Some(IndexedWallet {
                sync_progress: SyncProgress { synced: false, lag: 1_000 },
                ..IndexedWallet::default()
            }));
        }
        let remaining = self.sync_delay.load(Ordering::SeqCst);
        if remaining > 0 {
            self.sync_delay.store(remaining - 1, Ordering::SeqCst);
            return Ok(Some(IndexedWallet {
                sync_progress: SyncProgress {
                    synced: false,
                    lag: u64::from(remaining),
                },
                ..IndexedWallet::default()
            }));
        }
        Ok(Some(Self::funded_wallet(coin_public_key)))
    }
}

#[async_trait]
impl Prover for InMemoryNetwork {
    async fn prove(&self, payload: Vec<u8>) -> Result<Vec<u8>, WalletError> {
        Ok(blake3::hash(&payload).as_bytes().to_vec())
    }
}

#[async_trait]
impl TransactionSubmitter for InMemoryNetwork {
    async fn submit(&self, tx: &[u8]) -> Result<String, WalletError> {
        if let Some(reason) = self
            .reject_submissions
            .lock()
            .map_err(|_| WalletError::Network("lock poisoned".into()))?
            .clone()
        {
            return Err(WalletError::Submission(reason));
        }

        let decoded = WalletTransaction::deserialize(tx, self.network_id)?;
        if decoded.proof.is_none() {
            return Err(WalletError::Submission("transaction is not proved".into()));
        }
        let action = ContractAction::decode(&decoded.intent)
            .map_err(|e| WalletError::Submission(format!("undecodable contract action: {e}")))?;

        let hash = transaction_id(tx);
        let mut chain = self.lock()?;
        let address = action.address().to_hex();
        let apply_stage = match action.apply(chain.contracts.get(&address), self.policy) {
            Ok(next) => {
                chain.contracts.insert(address.clone(), next);
                APPLY_STAGE_SUCCESS
            }
            Err(e) => {
                tracing::debug!(error = %e, %address, "contract action rejected");
                APPLY_STAGE_FAILURE
            }
        };

        let status = TransactionStatus {
            hash: hash.clone(),
            apply_stage: apply_stage.to_string(),
        };
        let block = chain.push_block(vec![status]);
        chain.transactions.insert(
            hash.clone(),
            TransactionInfo {
                hash: hash.clone(),
                apply_stage: apply_stage.to_string(),
                block,
            },
        );
        Ok(hash)
    }
}
