//! Bridge configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use zkaudit_ledger::ResubmissionPolicy;
use zkaudit_wallet::network::{DEFAULT_INDEXER, DEFAULT_INDEXER_WS, DEFAULT_NODE, DEFAULT_PROOF_SERVER};
use zkaudit_wallet::{Endpoints, NetworkId, PollSchedule};

use crate::error::BridgeError;

/// Default session record path.
pub const DEFAULT_STATE_FILE: &str = ".contract-state.json";
/// Default private-state database directory.
pub const DEFAULT_PRIVATE_STATE_DIR: &str = ".zkaudit-private-state";
/// Default private-state store name.
pub const DEFAULT_PRIVATE_STATE_STORE: &str = "zkaudit-testnet-state";
/// Default environment name.
pub const DEFAULT_ENVIRONMENT: &str = "testnet";

/// Bridge configuration.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub endpoints: Endpoints,
    /// Environment name persisted in the session record.
    pub environment: String,
    /// Set when `MIDNIGHT_ENVIRONMENT` was given. It then wins over an
    /// environment named in an `init` request.
    pub environment_pinned: bool,
    pub network_id: NetworkId,
    pub state_file: PathBuf,
    pub private_state_dir: PathBuf,
    pub private_state_store: String,
    pub sync: PollSchedule,
    pub policy: ResubmissionPolicy,
    /// Blocks sampled by `network_health`.
    pub health_sample: u64,
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let endpoints = Endpoints::parse(
            &get("MIDNIGHT_INDEXER", DEFAULT_INDEXER),
            &get("MIDNIGHT_INDEXER_WS", DEFAULT_INDEXER_WS),
            &get("MIDNIGHT_PROOF_SERVER", DEFAULT_PROOF_SERVER),
            &get("MIDNIGHT_NODE", DEFAULT_NODE),
        )?;

        let pinned = lookup("MIDNIGHT_ENVIRONMENT").filter(|e| !e.trim().is_empty());
        let environment_pinned = pinned.is_some();
        let environment = pinned.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let network_id: NetworkId = environment.parse()?;

        let defaults = PollSchedule::default();
        let sync = PollSchedule {
            grace: parse_var(&lookup, "ZKAUDIT_SYNC_GRACE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace),
            interval: parse_var(&lookup, "ZKAUDIT_SYNC_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            max_attempts: parse_var(&lookup, "ZKAUDIT_SYNC_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
        };

        let policy = match lookup("ZKAUDIT_RESUBMISSION_POLICY").as_deref().map(str::trim) {
            None | Some("") | Some("reject") => ResubmissionPolicy::Reject,
            Some("overwrite") => ResubmissionPolicy::Overwrite,
            Some(other) => {
                return Err(BridgeError::Validation(format!(
                    "ZKAUDIT_RESUBMISSION_POLICY must be 'reject' or 'overwrite', got '{other}'"
                )))
            }
        };

        Ok(Self {
            endpoints,
            environment,
            environment_pinned,
            network_id,
            state_file: PathBuf::from(get("ZKAUDIT_STATE_FILE", DEFAULT_STATE_FILE)),
            private_state_dir: PathBuf::from(get("ZKAUDIT_PRIVATE_STATE_DIR", DEFAULT_PRIVATE_STATE_DIR)),
            private_state_store: get("ZKAUDIT_PRIVATE_STATE_STORE", DEFAULT_PRIVATE_STATE_STORE),
            sync,
            policy,
            health_sample: parse_var(&lookup, "ZKAUDIT_HEALTH_SAMPLE_BLOCKS")?.unwrap_or(10),
        })
    }

    /// Environment for a new session: the pinned one, else `requested`, else
    /// the default.
    pub fn session_environment(&self, requested: Option<&str>) -> String {
        match requested {
            Some(requested) if !self.environment_pinned => requested.to_string(),
            _ => self.environment.clone(),
        }
    }

    /// Same configuration bound to another environment.
    pub fn for_environment(&self, environment: &str) -> Result<Self, BridgeError> {
        Ok(Self {
            environment: environment.to_string(),
            network_id: environment.parse()?,
            ..self.clone()
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, BridgeError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| BridgeError::Validation(format!("invalid {key} '{raw}': {e}"))),
    }
}
