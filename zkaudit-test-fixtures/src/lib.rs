//! Shared fixtures for zkaudit tests: an in-memory network, a wallet builder
//! bound to it, and sample identifiers.

pub mod network;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use zkaudit_ledger::{AuditId, AuditorId, PrivateState};
use zkaudit_wallet::{
    Endpoints, NetworkId, PollSchedule, RemoteWallet, Wallet, WalletBuilder, WalletError, WalletSeed,
};

pub use network::InMemoryNetwork;

/// Standard 24-word test mnemonic (`abandon` x23 + `art`).
pub const SAMPLE_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
abandon abandon abandon art";

/// Wallet seed derived from [`SAMPLE_MNEMONIC`] at `m/44'/2400'/0'/0/0`.
pub const SAMPLE_SEED_HEX: &str = "af7a998947b1b1fd12d99cb40ee98a739e6a2518d8965690781d85ea0e3a5e13";

pub fn sample_audit_id(n: u8) -> AuditId {
    let mut bytes = [0u8; 32];
    bytes[0] = 0xA0;
    bytes[31] = n;
    AuditId(bytes)
}

pub fn sample_auditor_id() -> AuditorId {
    AuditorId([0x22; 32])
}

pub fn sample_private_state(risk_score: u64) -> PrivateState {
    PrivateState::new(b"reentrancy in withdraw() drains vault", risk_score)
}

/// Poll schedule short enough for real-time tests.
pub fn fast_schedule(max_attempts: u32) -> PollSchedule {
    PollSchedule {
        grace: Duration::from_millis(1),
        interval: Duration::from_millis(5),
        max_attempts,
    }
}

/// Builds [`RemoteWallet`]s talking to an [`InMemoryNetwork`].
#[derive(Clone)]
pub struct InMemoryWalletBuilder {
    network: Arc<InMemoryNetwork>,
}

impl InMemoryWalletBuilder {
    pub fn new(network: Arc<InMemoryNetwork>) -> Self {
        Self { network }
    }
}

#[async_trait]
impl WalletBuilder for InMemoryWalletBuilder {
    async fn build(
        &self,
        _endpoints: &Endpoints,
        seed: &WalletSeed,
        network_id: NetworkId,
    ) -> Result<Arc<dyn Wallet>, WalletError> {
        let wallet = RemoteWallet::new(
            seed,
            network_id,
            self.network.clone(),
            self.network.clone(),
            self.network.clone(),
        )
        .with_refresh_interval(Duration::from_millis(2))
        .with_finality_schedule(fast_schedule(20));
        Ok(Arc::new(wallet))
    }
}
