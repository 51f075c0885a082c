//! Client-side wallet plumbing for zkaudit.
//!
//! - [`keys`]: mnemonic or raw seed to a 32-byte wallet seed
//! - [`sync`]: build a wallet and wait until it is usable
//! - [`pipeline`]: balance, prove and submit contract calls
//! - [`indexer`], [`proof_server`], [`node`]: network collaborators
//! - [`remote`]: the HTTP-backed [`Wallet`] implementation

pub mod error;
pub mod indexer;
pub mod keys;
pub mod network;
pub mod node;
pub mod pipeline;
pub mod proof_server;
pub mod remote;
pub mod sync;
pub mod transaction;
pub mod wallet;

pub use error::WalletError;
pub use indexer::{BlockInfo, IndexedWallet, Indexer, IndexerClient, TransactionInfo, TransactionStatus};
pub use keys::{derive_wallet_seed, WalletCredentials, WalletKeys, WalletSeed, DERIVATION_PATH};
pub use network::{Endpoints, NetworkId};
pub use node::{NodeClient, TransactionSubmitter};
pub use pipeline::TransactionPipeline;
pub use proof_server::{ProofServerClient, Prover};
pub use remote::{RemoteWallet, RemoteWalletBuilder};
pub use sync::{poll_until, PollSchedule, SyncPhase, SyncedWallet, WalletSyncOrchestrator};
pub use transaction::{
    BalancedTransaction, CoinInfo, TxReceipt, UnbalancedTransaction, WalletTransaction, NATIVE_TOKEN,
};
pub use wallet::{SyncProgress, Wallet, WalletBuilder, WalletState};
