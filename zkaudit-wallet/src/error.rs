//! Error types for wallet operations.

use thiserror::Error;

use crate::network::NetworkId;

/// Error type for key derivation, sync and the transaction pipeline.
#[derive(Error, Debug)]
pub enum WalletError {
    /// No usable credentials, or the configured ones are malformed.
    #[error("credential error: {0}")]
    Credential(String),

    /// The wallet did not reach a usable state within the poll budget.
    #[error("wallet failed to sync after {attempts} attempts")]
    SyncTimeout { attempts: u32 },

    /// A wait was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Indexer, proof server or node request failed.
    #[error("network error: {0}")]
    Network(String),

    /// A transaction was tagged for a different network.
    #[error("network id mismatch: expected {expected}, got {actual}")]
    NetworkIdMismatch { expected: NetworkId, actual: NetworkId },

    /// Wallet coins cannot cover the transaction.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// Malformed input or an artifact in the wrong pipeline stage.
    #[error("invalid transaction: {0}")]
    Validation(String),

    /// The proof server rejected or failed to prove the transaction.
    #[error("proving failed: {0}")]
    Proving(String),

    /// The node rejected the transaction.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Transaction encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<bincode::Error> for WalletError {
    fn from(err: bincode::Error) -> Self {
        WalletError::Encoding(err.to_string())
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        WalletError::Network(err.to_string())
    }
}
