//! Network health sampled from recent blocks.

use serde::Serialize;
use tracing::debug;
use zkaudit_ledger::serde_helpers::u64_string;
use zkaudit_wallet::Indexer;

use crate::error::BridgeError;

/// Success rate above which the network counts as healthy, in percent.
pub const HEALTHY_SUCCESS_RATE: f64 = 50.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthReport {
    #[serde(with = "u64_string")]
    pub latest_block: u64,
    pub block_hash: String,
    #[serde(with = "u64_string")]
    pub timestamp: u64,
    #[serde(with = "u64_string")]
    pub total_transactions_checked: u64,
    #[serde(with = "u64_string")]
    pub succeeded: u64,
    #[serde(with = "u64_string")]
    pub failed: u64,
    /// Percentage with two decimals, e.g. `"97.50"`.
    pub success_rate: String,
    pub healthy: bool,
}

/// Count transaction outcomes over the latest `blocks` blocks.
pub async fn network_health(indexer: &dyn Indexer, blocks: u64) -> Result<HealthReport, BridgeError> {
    let latest = indexer.latest_block().await?;

    let mut total = 0u64;
    let mut succeeded = 0u64;
    for offset in 0..blocks {
        let Some(height) = latest.height.checked_sub(offset) else {
            break;
        };
        let transactions = indexer.block_transactions(height).await?;
        total += transactions.len() as u64;
        succeeded += transactions.iter().filter(|tx| tx.succeeded()).count() as u64;
    }

    let rate = if total > 0 {
        succeeded as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    debug!(latest = latest.height, total, succeeded, "sampled network health");

    Ok(HealthReport {
        latest_block: latest.height,
        block_hash: latest.hash,
        timestamp: latest.timestamp,
        total_transactions_checked: total,
        succeeded,
        failed: total - succeeded,
        success_rate: format!("{rate:.2}"),
        healthy: rate > HEALTHY_SUCCESS_RATE,
    })
}
