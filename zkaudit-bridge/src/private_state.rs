//! Durable private-state store.
//!
//! Private states are keyed by `(store name, contract address)` and never
//! leave the local machine. The sled tree name is the store name; the key is
//! the hex contract address; values are JSON.
//!
//! sled holds an exclusive, non-blocking lock on its directory for as long as
//! a database handle is alive. An on-disk store therefore opens the database
//! per access and drops it straight after, and retries with exponential
//! backoff while another process holds the directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use zkaudit_ledger::{ContractAddress, PrivateState};

use crate::error::BridgeError;

pub trait PrivateStateStore: Send + Sync {
    fn get(&self, store: &str, address: &ContractAddress) -> Result<Option<PrivateState>, BridgeError>;

    fn set(&self, store: &str, address: &ContractAddress, state: &PrivateState) -> Result<(), BridgeError>;
}

/// Retry policy for a locked database directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenRetry {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for OpenRetry {
    /// Waits a little over six seconds in total.
    fn default() -> Self {
        Self {
            max_retries: 8,
            retry_delay_ms: 25,
        }
    }
}

enum Backing {
    Path(PathBuf),
    Temporary(sled::Db),
}

/// sled-backed [`PrivateStateStore`].
pub struct SledPrivateStateStore {
    backing: Backing,
    retry: OpenRetry,
}

impl SledPrivateStateStore {
    /// Store rooted at `path`. Nothing is opened until the first access.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            backing: Backing::Path(path.into()),
            retry: OpenRetry::default(),
        }
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, BridgeError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            backing: Backing::Temporary(db),
            retry: OpenRetry::default(),
        })
    }

    pub fn with_retry(mut self, retry: OpenRetry) -> Self {
        self.retry = retry;
        self
    }

    fn db(&self) -> Result<sled::Db, BridgeError> {
        match &self.backing {
            Backing::Path(path) => open_with_retry(path, self.retry),
            Backing::Temporary(db) => Ok(db.clone()),
        }
    }
}

fn open_with_retry(path: &Path, retry: OpenRetry) -> Result<sled::Db, BridgeError> {
    let mut attempt = 0;
    loop {
        match sled::open(path) {
            Ok(db) => return Ok(db),
            Err(e) if is_lock_contention(&e) && attempt < retry.max_retries => {
                let delay = Duration::from_millis(retry.retry_delay_ms << attempt);
                debug!(path = %path.display(), attempt, ?delay, "private state store is locked, retrying");
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                return Err(BridgeError::Storage(format!(
                    "failed to open private state store at {}: {e}",
                    path.display()
                )))
            }
        }
    }
}

// sled reports a held directory lock as an `Other` io error.
fn is_lock_contention(error: &sled::Error) -> bool {
    matches!(error, sled::Error::Io(e) if e.to_string().contains("could not acquire lock"))
}

impl PrivateStateStore for SledPrivateStateStore {
    fn get(&self, store: &str, address: &ContractAddress) -> Result<Option<PrivateState>, BridgeError> {
        let tree = self.db()?.open_tree(store)?;
        match tree.get(address.to_hex().as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                BridgeError::Storage(format!("corrupt private state for {address}: {e}"))
            }),
            None => Ok(None),
        }
    }

    fn set(&self, store: &str, address: &ContractAddress, state: &PrivateState) -> Result<(), BridgeError> {
        let tree = self.db()?.open_tree(store)?;
        let value = serde_json::to_vec(state).map_err(|e| BridgeError::Storage(e.to_string()))?;
        tree.insert(address.to_hex().as_bytes(), value)?;
        tree.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_until_set() {
        let store = SledPrivateStateStore::temporary().unwrap();
        let address = ContractAddress([7; 32]);
        assert!(store.get("zkaudit-testnet-state", &address).unwrap().is_none());

        let state = PrivateState::new(b"overflow in mint()", 88);
        store.set("zkaudit-testnet-state", &address, &state).unwrap();
        assert_eq!(store.get("zkaudit-testnet-state", &address).unwrap(), Some(state));
    }

    #[test]
    fn store_names_are_isolated() {
        let store = SledPrivateStateStore::temporary().unwrap();
        let address = ContractAddress([7; 32]);
        store.set("a", &address, &PrivateState::new(b"x", 1)).unwrap();
        assert!(store.get("b", &address).unwrap().is_none());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let address = ContractAddress([9; 32]);
        let state = PrivateState::new(b"unchecked call", 70);
        SledPrivateStateStore::at(dir.path().join("db"))
            .set("s", &address, &state)
            .unwrap();
        let store = SledPrivateStateStore::at(dir.path().join("db"));
        assert_eq!(store.get("s", &address).unwrap(), Some(state));
    }

    #[test]
    fn creates_nothing_until_accessed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let _store = SledPrivateStateStore::at(&path);
        assert!(!path.exists());
    }

    #[test]
    fn stores_sharing_a_directory_do_not_hold_it_between_accesses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let address = ContractAddress([3; 32]);
        let first = SledPrivateStateStore::at(&path);
        let second = SledPrivateStateStore::at(&path).with_retry(OpenRetry {
            max_retries: 0,
            retry_delay_ms: 1,
        });

        first.set("s", &address, &PrivateState::new(b"a", 1)).unwrap();
        second.set("s", &address, &PrivateState::new(b"b", 2)).unwrap();
        assert_eq!(first.get("s", &address).unwrap(), Some(PrivateState::new(b"b", 2)));
    }

    #[test]
    fn held_directory_fails_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let _held = sled::open(&path).unwrap();

        let store = SledPrivateStateStore::at(&path).with_retry(OpenRetry {
            max_retries: 2,
            retry_delay_ms: 1,
        });
        let err = store.get("s", &ContractAddress([1; 32])).unwrap_err();
        assert_eq!(err.kind(), "StorageError");
        assert!(err.to_string().contains("could not acquire lock"), "{err}");
    }

    #[test]
    fn waits_for_a_released_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let held = sled::open(&path).unwrap();
        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            drop(held);
        });

        let store = SledPrivateStateStore::at(&path).with_retry(OpenRetry {
            max_retries: 10,
            retry_delay_ms: 10,
        });
        assert!(store.get("s", &ContractAddress([1; 32])).unwrap().is_none());
        release.join().unwrap();
    }
}
