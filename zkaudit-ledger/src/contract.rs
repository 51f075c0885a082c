//! Contract actions as carried inside transactions.
//!
//! A deploy creates a ledger at a fresh address; a call carries a
//! `submitAudit` transcript for an existing one. The receiving network applies
//! actions with [`ContractAction::apply`].

use serde::{Deserialize, Serialize};

use crate::circuit::{AuditTranscript, SUBMIT_AUDIT_ENTRY_POINT};
use crate::error::LedgerError;
use crate::state::LedgerState;
use crate::transition::{apply_transcript, ResubmissionPolicy};
use crate::types::ContractAddress;

/// BLAKE3 derive-key context for contract addresses.
const CONTRACT_ADDRESS_CONTEXT: &str = "zkaudit 2025 contract address v1";

/// Address of a deployment: `H(deploy_payload, nonce)`.
pub fn contract_address(deploy_payload: &[u8], nonce: &[u8; 32]) -> ContractAddress {
    let mut hasher = blake3::Hasher::new_derive_key(CONTRACT_ADDRESS_CONTEXT);
    hasher.update(deploy_payload);
    hasher.update(nonce);
    ContractAddress(*hasher.finalize().as_bytes())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContractAction {
    Deploy {
        address: ContractAddress,
        initial_state: LedgerState,
    },
    Call {
        address: ContractAddress,
        entry_point: String,
        transcript: AuditTranscript,
    },
}

impl ContractAction {
    /// Deploy a genesis ledger at an address derived from `nonce`.
    pub fn deploy(nonce: &[u8; 32]) -> Result<Self, LedgerError> {
        let initial_state = LedgerState::new();
        let payload = initial_state.to_bytes()?;
        Ok(ContractAction::Deploy {
            address: contract_address(&payload, nonce),
            initial_state,
        })
    }

    pub fn submit_audit(address: ContractAddress, transcript: AuditTranscript) -> Self {
        ContractAction::Call {
            address,
            entry_point: SUBMIT_AUDIT_ENTRY_POINT.to_string(),
            transcript,
        }
    }

    pub fn address(&self) -> ContractAddress {
        match self {
            ContractAction::Deploy { address, .. } | ContractAction::Call { address, .. } => *address,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// State at `self.address()` after this action, given the current state there.
    pub fn apply(
        &self,
        current: Option<&LedgerState>,
        policy: ResubmissionPolicy,
    ) -> Result<LedgerState, LedgerError> {
        match self {
            ContractAction::Deploy {
                address,
                initial_state,
            } => {
                if current.is_some() {
                    return Err(LedgerError::AddressInUse(*address));
                }
                initial_state.check_invariant()?;
                Ok(initial_state.clone())
            }
            ContractAction::Call {
                address,
                entry_point,
                transcript,
            } => {
                if entry_point != SUBMIT_AUDIT_ENTRY_POINT {
                    return Err(LedgerError::UnknownEntryPoint(entry_point.clone()));
                }
                let mut next = current
                    .cloned()
                    .ok_or(LedgerError::ContractNotFound(*address))?;
                apply_transcript(&mut next, transcript, policy)?;
                Ok(next)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::evaluate_submit_audit;
    use crate::types::{AuditId, AuditorId};
    use crate::witness::{AuditWitnesses, PrivateState};

    #[test]
    fn nonce_changes_address() {
        let a = ContractAction::deploy(&[1; 32]).unwrap();
        let b = ContractAction::deploy(&[2; 32]).unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn deploy_then_call() {
        let deploy = ContractAction::deploy(&[3; 32]).unwrap();
        let state = deploy.apply(None, ResubmissionPolicy::Reject).unwrap();
        assert!(state.is_empty());
        assert!(matches!(
            deploy.apply(Some(&state), ResubmissionPolicy::Reject),
            Err(LedgerError::AddressInUse(_))
        ));

        let transcript = evaluate_submit_audit(
            &AuditWitnesses,
            &state,
            &PrivateState::new(b"x", 99),
            AuditId([1; 32]),
            AuditorId([2; 32]),
            50,
            ResubmissionPolicy::Reject,
        )
        .unwrap()
        .transcript;
        let call = ContractAction::submit_audit(deploy.address(), transcript);
        let decoded = ContractAction::decode(&call.encode().unwrap()).unwrap();
        assert_eq!(decoded, call);

        let next = decoded.apply(Some(&state), ResubmissionPolicy::Reject).unwrap();
        assert_eq!(next.len(), 1);
    }

    #[test]
    fn call_without_contract_fails() {
        let transcript = evaluate_submit_audit(
            &AuditWitnesses,
            &LedgerState::new(),
            &PrivateState::new(b"x", 99),
            AuditId([1; 32]),
            AuditorId([2; 32]),
            50,
            ResubmissionPolicy::Reject,
        )
        .unwrap()
        .transcript;
        let call = ContractAction::submit_audit(ContractAddress([9; 32]), transcript);
        assert!(matches!(
            call.apply(None, ResubmissionPolicy::Reject),
            Err(LedgerError::ContractNotFound(_))
        ));
    }
}
