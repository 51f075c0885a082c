//! Durable session record: which contract the bridge is bound to.
//!
//! The record is a small pretty-printed JSON file shared by every bridge
//! invocation. Access goes through an advisory `flock` on `<record>.lock`.
//! Readers take it shared, `init` and `submit_audit` take it exclusive for
//! the whole command.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BridgeError;

/// Message returned by every command that needs a session before `init` ran.
pub const NO_SESSION: &str = "No contract initialized. Call init first.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub contract_address: String,
    pub environment: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// RAII guard holding the record lock. Released when dropped.
#[derive(Debug)]
pub struct RecordLock {
    mode: LockMode,
    #[cfg(unix)]
    _file: fs::File,
}

impl RecordLock {
    #[cfg(unix)]
    fn acquire(lock_path: &Path, mode: LockMode) -> io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;
        let operation = match mode {
            LockMode::Shared => libc::LOCK_SH,
            LockMode::Exclusive => libc::LOCK_EX,
        };
        // SAFETY: `file` is open and owned by the guard, so the descriptor stays
        // valid until drop closes it and releases the lock.
        let ret = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { mode, _file: file })
    }

    #[cfg(not(unix))]
    fn acquire(_lock_path: &Path, mode: LockMode) -> io::Result<Self> {
        Ok(Self { mode })
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".lock");
    PathBuf::from(p)
}

/// The session record file and its lock.
#[derive(Clone, Debug)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_shared(&self) -> Result<RecordLock, BridgeError> {
        self.lock(LockMode::Shared)
    }

    pub fn lock_exclusive(&self) -> Result<RecordLock, BridgeError> {
        self.lock(LockMode::Exclusive)
    }

    fn lock(&self, mode: LockMode) -> Result<RecordLock, BridgeError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let lock_path = lock_path_for(&self.path);
        debug!(path = %lock_path.display(), ?mode, "acquiring session record lock");
        RecordLock::acquire(&lock_path, mode).map_err(|e| {
            BridgeError::Storage(format!("failed to lock {}: {e}", lock_path.display()))
        })
    }

    /// Read the record. `StateNotFound` when no session was initialized.
    pub fn read(&self, _lock: &RecordLock) -> Result<SessionRecord, BridgeError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BridgeError::StateNotFound(NO_SESSION.into()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map_err(|e| {
            BridgeError::Storage(format!("corrupt session record {}: {e}", self.path.display()))
        })
    }

    /// Replace the record. Requires the exclusive lock.
    pub fn write(&self, lock: &RecordLock, record: &SessionRecord) -> Result<(), BridgeError> {
        if lock.mode() != LockMode::Exclusive {
            return Err(BridgeError::Storage(
                "session record written without an exclusive lock".into(),
            ));
        }
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| BridgeError::Storage(e.to_string()))?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), address = %record.contract_address, "session record written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionRecord {
        SessionRecord {
            contract_address: "ab".repeat(32),
            environment: "testnet".into(),
        }
    }

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/tmp/.contract-state.json")),
            PathBuf::from("/tmp/.contract-state.json.lock")
        );
    }

    #[test]
    fn missing_record_is_state_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("state.json"));
        let lock = store.lock_shared().unwrap();
        let err = store.read(&lock).unwrap_err();
        assert_eq!(err.kind(), "StateNotFoundError");
        assert_eq!(err.to_string(), NO_SESSION);
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("state.json"));
        {
            let lock = store.lock_exclusive().unwrap();
            store.write(&lock, &sample()).unwrap();
        }
        let lock = store.lock_shared().unwrap();
        assert_eq!(store.read(&lock).unwrap(), sample());

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"contract_address\""));
    }

    #[test]
    fn shared_lock_cannot_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("state.json"));
        let lock = store.lock_shared().unwrap();
        assert!(store.write(&lock, &sample()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn exclusive_lock_serializes_writers() {
        use std::sync::{Arc, Barrier};

        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("state.json"));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let lock = store.lock_exclusive().unwrap();
                    let record = SessionRecord {
                        contract_address: format!("{:02x}", i).repeat(32),
                        environment: "testnet".into(),
                    };
                    store.write(&lock, &record).unwrap();
                    assert_eq!(store.read(&lock).unwrap(), record);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
