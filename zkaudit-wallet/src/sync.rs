//! Wallet synchronization.
//!
//! ```text
//! Initializing --build+start--> Syncing --usable--> Synced
//!                                  |
//!                                  +--attempts exhausted--> SyncFailed
//! ```
//!
//! Waiting is expressed as a [`PollSchedule`] driven by [`poll_until`], so the
//! fixed-interval policy can be swapped without touching callers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::keys::WalletSeed;
use crate::network::{Endpoints, NetworkId};
use crate::wallet::{Wallet, WalletBuilder, WalletState};

/// Fixed-interval poll policy with a hard attempt ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSchedule {
    /// Delay before the first probe.
    pub grace: Duration,
    /// Delay between probes.
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            max_attempts: 40,
        }
    }
}

impl PollSchedule {
    /// Upper bound on time spent waiting: `grace + attempts * interval`.
    pub fn budget(&self) -> Duration {
        self.grace + self.interval.saturating_mul(self.max_attempts)
    }
}

/// Probe until it yields a value, the attempts run out, or `cancel` fires.
///
/// `probe` receives the 1-based attempt number. Probe errors abort the wait.
pub async fn poll_until<T, F, Fut>(
    schedule: &PollSchedule,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, WalletError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, WalletError>>,
{
    let deadline = Instant::now() + schedule.budget();

    tokio::select! {
        _ = cancel.cancelled() => return Err(WalletError::Cancelled),
        _ = tokio::time::sleep(schedule.grace) => {}
    }

    for attempt in 1..=schedule.max_attempts {
        if let Some(value) = probe(attempt).await? {
            return Ok(value);
        }
        if attempt == schedule.max_attempts {
            break;
        }

        let wake = (Instant::now() + schedule.interval).min(deadline);
        tokio::select! {
            _ = cancel.cancelled() => return Err(WalletError::Cancelled),
            _ = tokio::time::sleep_until(wake) => {}
        }
    }

    Err(WalletError::SyncTimeout {
        attempts: schedule.max_attempts,
    })
}

/// Observable orchestrator phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    Initializing,
    Syncing { attempt: u32 },
    Synced,
    SyncFailed,
}

/// A wallet that reached a usable state.
pub struct SyncedWallet {
    pub wallet: Arc<dyn Wallet>,
    pub state: WalletState,
}

/// Builds a wallet, starts it and waits until it is usable.
pub struct WalletSyncOrchestrator {
    builder: Arc<dyn WalletBuilder>,
    endpoints: Endpoints,
    network_id: NetworkId,
    schedule: PollSchedule,
    phase: watch::Sender<SyncPhase>,
}

impl WalletSyncOrchestrator {
    pub fn new(builder: Arc<dyn WalletBuilder>, endpoints: Endpoints, network_id: NetworkId) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Initializing);
        Self {
            builder,
            endpoints,
            network_id,
            schedule: PollSchedule::default(),
            phase,
        }
    }

    pub fn with_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn schedule(&self) -> &PollSchedule {
        &self.schedule
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase.borrow().clone()
    }

    /// Build and sync without external cancellation.
    pub async fn build_and_sync(&self, seed: &WalletSeed) -> Result<SyncedWallet, WalletError> {
        self.build_and_sync_with_cancel(seed, &CancellationToken::new()).await
    }

    pub async fn build_and_sync_with_cancel(
        &self,
        seed: &WalletSeed,
        cancel: &CancellationToken,
    ) -> Result<SyncedWallet, WalletError> {
        self.phase.send_replace(SyncPhase::Initializing);
        info!(network = %self.network_id, indexer = %self.endpoints.indexer, "building wallet");

        let wallet = match self.builder.build(&self.endpoints, seed, self.network_id).await {
            Ok(wallet) => wallet,
            Err(e) => {
                self.phase.send_replace(SyncPhase::SyncFailed);
                return Err(e);
            }
        };
        if let Err(e) = wallet.start().await {
            self.phase.send_replace(SyncPhase::SyncFailed);
            return Err(e);
        }

        let outcome = poll_until(&self.schedule, cancel, |attempt| {
            let wallet = Arc::clone(&wallet);
            self.phase.send_replace(SyncPhase::Syncing { attempt });
            async move {
                let state = wallet.state().await?;
                debug!(
                    attempt,
                    balances = state.balances.len(),
                    synced = state.is_synced(),
                    "wallet sync poll"
                );
                Ok(state.is_usable().then_some(state))
            }
        })
        .await;

        match outcome {
            Ok(state) => {
                self.phase.send_replace(SyncPhase::Synced);
                info!(address = %state.address, "wallet synced");
                Ok(SyncedWallet { wallet, state })
            }
            Err(e) => {
                self.phase.send_replace(SyncPhase::SyncFailed);
                warn!(error = %e, "wallet sync failed");
                if let Err(close_err) = wallet.close().await {
                    debug!(error = %close_err, "failed to close wallet after sync failure");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_schedule(max_attempts: u32) -> PollSchedule {
        PollSchedule {
            grace: Duration::from_secs(3),
            interval: Duration::from_secs(1),
            max_attempts,
        }
    }

    #[test]
    fn default_schedule_budget() {
        let schedule = PollSchedule::default();
        assert_eq!(schedule.max_attempts, 40);
        assert_eq!(schedule.budget(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_ready_value() {
        let calls = AtomicU32::new(0);
        let value = poll_until(&fast_schedule(10), &CancellationToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((attempt == 3).then_some(attempt)) }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let err = poll_until(&fast_schedule(5), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<Option<()>, WalletError>(None) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, WalletError::SyncTimeout { attempts: 5 }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(start.elapsed() <= fast_schedule(5).budget());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = poll_until(&fast_schedule(5), &cancel, |_| async {
            Ok::<Option<()>, WalletError>(None)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, WalletError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_abort() {
        let err = poll_until(&fast_schedule(5), &CancellationToken::new(), |_| async {
            Err::<Option<()>, _>(WalletError::Network("indexer down".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, WalletError::Network(_)));
    }
}
