//! Bridge error taxonomy.
//!
//! Every variant carries a stable [`BridgeError::kind`] code that is returned
//! to callers as `error_kind`.

use thiserror::Error;
use zkaudit_ledger::LedgerError;
use zkaudit_wallet::WalletError;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Malformed request payload or field.
    #[error("{0}")]
    Validation(String),

    /// The circuit rejected the witness. The ledger is unchanged.
    #[error("{0}")]
    Assertion(String),

    #[error("{0}")]
    Credential(String),

    #[error("{0}")]
    SyncTimeout(String),

    #[error("{0}")]
    Network(String),

    /// No session record, or no contract at the recorded address.
    #[error("{0}")]
    StateNotFound(String),

    #[error("deployment failed: {0}")]
    Deployment(String),

    /// Session record or private-state store failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl BridgeError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Validation(_) => "ValidationError",
            BridgeError::Assertion(_) => "AssertionFailure",
            BridgeError::Credential(_) => "CredentialError",
            BridgeError::SyncTimeout(_) => "SyncTimeoutError",
            BridgeError::Network(_) => "NetworkError",
            BridgeError::StateNotFound(_) => "StateNotFoundError",
            BridgeError::Deployment(_) => "DeploymentError",
            BridgeError::Storage(_) => "StorageError",
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, BridgeError::Assertion(_))
    }

    /// Re-tag wallet and network failures as a deployment failure.
    pub(crate) fn into_deployment(self) -> Self {
        match self {
            BridgeError::Credential(_) | BridgeError::Validation(_) | BridgeError::Deployment(_) => self,
            other => BridgeError::Deployment(other.to_string()),
        }
    }
}

impl From<LedgerError> for BridgeError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AssertionFailure(_) => BridgeError::Assertion(err.to_string()),
            LedgerError::ContractNotFound(_) => BridgeError::StateNotFound(err.to_string()),
            LedgerError::Encoding(_) => BridgeError::Storage(err.to_string()),
            _ => BridgeError::Validation(err.to_string()),
        }
    }
}

impl From<WalletError> for BridgeError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Credential(_) => BridgeError::Credential(err.to_string()),
            WalletError::SyncTimeout { .. } => BridgeError::SyncTimeout(err.to_string()),
            WalletError::Validation(_)
            | WalletError::NetworkIdMismatch { .. }
            | WalletError::InsufficientFunds { .. } => BridgeError::Validation(err.to_string()),
            _ => BridgeError::Network(err.to_string()),
        }
    }
}

impl From<sled::Error> for BridgeError {
    fn from(err: sled::Error) -> Self {
        BridgeError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_keeps_circuit_text() {
        let err = BridgeError::from(LedgerError::AssertionFailure("risk_score < threshold".into()));
        assert_eq!(err.kind(), "AssertionFailure");
        assert_eq!(err.to_string(), "failed assert: risk_score < threshold");
    }

    #[test]
    fn wallet_errors_map_to_kinds() {
        assert_eq!(
            BridgeError::from(WalletError::SyncTimeout { attempts: 40 }).kind(),
            "SyncTimeoutError"
        );
        assert_eq!(
            BridgeError::from(WalletError::Credential("x".into())).kind(),
            "CredentialError"
        );
        assert_eq!(
            BridgeError::from(WalletError::Network("down".into())).kind(),
            "NetworkError"
        );
    }

    #[test]
    fn deployment_retag_keeps_credential_errors() {
        let credential = BridgeError::Credential("missing".into()).into_deployment();
        assert_eq!(credential.kind(), "CredentialError");
        let network = BridgeError::Network("down".into()).into_deployment();
        assert_eq!(network.kind(), "DeploymentError");
    }
}
