//! Error types for the audit ledger.

use thiserror::Error;

use crate::types::{AuditId, ContractAddress, StateRoot};

/// Message carried by the threshold assertion, matching the circuit's assert text.
pub const RISK_BELOW_THRESHOLD: &str = "risk_score < threshold";

/// Error type for ledger evaluation and state application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A circuit assertion failed. The ledger is unchanged.
    #[error("failed assert: {0}")]
    AssertionFailure(String),

    /// Malformed hex input for a fixed-width field.
    #[error("invalid {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    /// The audit id is already recorded and the policy rejects resubmission.
    #[error("audit {0} is already recorded")]
    DuplicateAudit(AuditId),

    /// The transcript was produced against a different ledger state.
    #[error("stale transcript: evaluated against {expected}, ledger is at {actual}")]
    StaleTranscript { expected: StateRoot, actual: StateRoot },

    /// Applying the transcript did not reproduce its claimed next state root.
    #[error("transcript next state root mismatch: claimed {claimed}, computed {computed}")]
    TranscriptMismatch { claimed: StateRoot, computed: StateRoot },

    /// The three ledger maps no longer share one key set.
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    /// No contract is deployed at the address.
    #[error("no contract at {0}")]
    ContractNotFound(ContractAddress),

    /// A deploy targeted an address that already holds a contract.
    #[error("contract address {0} is already in use")]
    AddressInUse(ContractAddress),

    /// A call named a circuit the contract does not have.
    #[error("unknown entry point '{0}'")]
    UnknownEntryPoint(String),

    /// Ledger state could not be encoded or decoded.
    #[error("ledger encoding error: {0}")]
    Encoding(String),
}

impl LedgerError {
    /// Whether this error is the expected below-threshold outcome.
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self, LedgerError::AssertionFailure(_))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Encoding(err.to_string())
    }
}
