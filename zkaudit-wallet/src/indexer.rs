//! GraphQL client for the indexer.
//!
//! The indexer answers queries over blocks, transactions, contract state and
//! per-wallet coin state. [`Indexer`] is the seam the rest of the workspace
//! depends on; [`IndexerClient`] is the HTTP implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;
use zkaudit_ledger::serde_helpers::u64_string;

use crate::error::WalletError;
use crate::transaction::CoinInfo;
use crate::wallet::SyncProgress;

/// Apply stage reported for fully successful transactions.
pub const APPLY_STAGE_SUCCESS: &str = "SucceedEntirely";

/// Block header fields the bridge reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: String,
    pub timestamp: u64,
}

/// Outcome of one transaction inside a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    #[serde(default)]
    pub hash: String,
    #[serde(rename = "applyStage")]
    pub apply_stage: String,
}

impl TransactionStatus {
    pub fn succeeded(&self) -> bool {
        self.apply_stage == APPLY_STAGE_SUCCESS
    }
}

/// A transaction located by hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub hash: String,
    #[serde(rename = "applyStage")]
    pub apply_stage: String,
    pub block: BlockInfo,
}

/// Wallet coin state as tracked by the indexer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexedWallet {
    pub balances: BTreeMap<String, u64>,
    pub available_coins: Vec<CoinInfo>,
    pub pending_coins: Vec<CoinInfo>,
    pub sync_progress: SyncProgress,
}

/// Read access to indexed chain data.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn latest_block(&self) -> Result<BlockInfo, WalletError>;

    async fn block_transactions(&self, height: u64) -> Result<Vec<TransactionStatus>, WalletError>;

    async fn transaction(&self, hash: &str) -> Result<Option<TransactionInfo>, WalletError>;

    /// Serialized ledger state of the contract at `address`, if one exists.
    async fn contract_state(&self, address: &str) -> Result<Option<Vec<u8>>, WalletError>;

    async fn wallet_state(&self, coin_public_key: &str) -> Result<Option<IndexedWallet>, WalletError>;
}

/// HTTP GraphQL indexer client.
#[derive(Clone, Debug)]
pub struct IndexerClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl IndexerClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Execute a GraphQL query and decode its `data` member.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, WalletError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::Network(format!("indexer request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WalletError::Network(format!(
                "indexer request failed with status: {}",
                response.status()
            )));
        }

        let envelope: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| WalletError::Network(format!("failed to parse indexer response: {e}")))?;

        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            return Err(WalletError::Network(format!("indexer error: {}", messages.join("; "))));
        }

        envelope
            .data
            .ok_or_else(|| WalletError::Network("indexer response has no data".into()))
    }
}

#[async_trait]
impl Indexer for IndexerClient {
    async fn latest_block(&self) -> Result<BlockInfo, WalletError> {
        let query = r#"
            query {
                block {
                    height
                    hash
                    timestamp
                }
            }
        "#;

        let data: LatestBlockData = self.execute(query, serde_json::json!({})).await?;
        data.block
            .ok_or_else(|| WalletError::Network("indexer has no blocks".into()))
    }

    async fn block_transactions(&self, height: u64) -> Result<Vec<TransactionStatus>, WalletError> {
        let query = r#"
            query($height: Int!) {
                block(offset: { height: $height }) {
                    transactions {
                        hash
                        applyStage
                    }
                }
            }
        "#;

        let data: BlockTransactionsData = self
            .execute(query, serde_json::json!({ "height": height }))
            .await?;
        Ok(data.block.map(|b| b.transactions).unwrap_or_default())
    }

    async fn transaction(&self, hash: &str) -> Result<Option<TransactionInfo>, WalletError> {
        let query = r#"
            query($hash: String!) {
                transactions(offset: { hash: $hash }) {
                    hash
                    applyStage
                    block {
                        height
                        hash
                        timestamp
                    }
                }
            }
        "#;

        let data: TransactionsData = self
            .execute(query, serde_json::json!({ "hash": hash }))
            .await?;
        Ok(data.transactions.into_iter().next())
    }

    async fn contract_state(&self, address: &str) -> Result<Option<Vec<u8>>, WalletError> {
        let query = r#"
            query($address: HexEncoded!) {
                contractAction(address: $address) {
                    state
                }
            }
        "#;

        let data: ContractActionData = self
            .execute(query, serde_json::json!({ "address": address }))
            .await?;

        data.contract_action
            .map(|action| {
                hex::decode(action.state.trim_start_matches("0x"))
                    .map_err(|e| WalletError::Network(format!("contract state is not hex: {e}")))
            })
            .transpose()
    }

    async fn wallet_state(&self, coin_public_key: &str) -> Result<Option<IndexedWallet>, WalletError> {
        let query = r#"
            query($key: HexEncoded!) {
                walletState(coinPublicKey: $key) {
                    balances { tokenType value }
                    availableCoins { nonce tokenType value }
                    pendingCoins { nonce tokenType value }
                    syncProgress { synced lag }
                }
            }
        "#;

        let data: WalletStateData = self
            .execute(query, serde_json::json!({ "key": coin_public_key }))
            .await?;
        Ok(data.wallet_state.map(IndexedWallet::from))
    }
}

// === Response types ===

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LatestBlockData {
    block: Option<BlockInfo>,
}

#[derive(Debug, Deserialize)]
struct BlockTransactionsData {
    block: Option<BlockTransactions>,
}

#[derive(Debug, Deserialize)]
struct BlockTransactions {
    transactions: Vec<TransactionStatus>,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: Vec<TransactionInfo>,
}

#[derive(Debug, Deserialize)]
struct ContractActionData {
    #[serde(rename = "contractAction")]
    contract_action: Option<ContractAction>,
}

#[derive(Debug, Deserialize)]
struct ContractAction {
    state: String,
}

#[derive(Debug, Deserialize)]
struct WalletStateData {
    #[serde(rename = "walletState")]
    wallet_state: Option<WalletStateEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletStateEntry {
    balances: Vec<TokenBalance>,
    available_coins: Vec<CoinEntry>,
    pending_coins: Vec<CoinEntry>,
    sync_progress: SyncProgress,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalance {
    token_type: String,
    #[serde(with = "u64_string")]
    value: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinEntry {
    nonce: String,
    token_type: String,
    #[serde(with = "u64_string")]
    value: u64,
}

impl From<WalletStateEntry> for IndexedWallet {
    fn from(entry: WalletStateEntry) -> Self {
        let coins = |entries: Vec<CoinEntry>| -> Vec<CoinInfo> {
            entries
                .into_iter()
                .filter_map(|c| {
                    let nonce = zkaudit_ledger::parse_hex_array::<32>("nonce", &c.nonce).ok()?;
                    Some(CoinInfo {
                        nonce,
                        token_type: c.token_type,
                        value: c.value,
                    })
                })
                .collect()
        };

        Self {
            balances: entry
                .balances
                .into_iter()
                .map(|b| (b.token_type, b.value))
                .collect(),
            available_coins: coins(entry.available_coins),
            pending_coins: coins(entry.pending_coins),
            sync_progress: entry.sync_progress,
        }
    }
}
