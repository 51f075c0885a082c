//! Public ledger state and its commitment.
//!
//! The ledger is three maps that always share one key set:
//!
//! ```text
//! proofs:      audit_id -> proof commitment
//! is_verified: audit_id -> bool
//! auditor_id:  audit_id -> auditor identifier
//! ```
//!
//! Maps start empty and only grow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::{serde_helpers::u64_string, AuditId, AuditorId, ProofHash, StateRoot};

/// BLAKE3 derive-key context for the state root.
const STATE_ROOT_CONTEXT: &str = "zkaudit 2025 ledger state root v1";

/// The public audit ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    proofs: BTreeMap<AuditId, ProofHash>,
    is_verified: BTreeMap<AuditId, bool>,
    auditor_id: BTreeMap<AuditId, AuditorId>,
}

impl LedgerState {
    /// Genesis ledger with all maps empty.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proofs(&self) -> &BTreeMap<AuditId, ProofHash> {
        &self.proofs
    }

    pub fn is_verified_map(&self) -> &BTreeMap<AuditId, bool> {
        &self.is_verified
    }

    pub fn auditor_ids(&self) -> &BTreeMap<AuditId, AuditorId> {
        &self.auditor_id
    }

    /// Membership as seen by `is_verified`, the map queries consult.
    pub fn contains(&self, audit_id: &AuditId) -> bool {
        self.is_verified.contains_key(audit_id)
    }

    pub fn proof(&self, audit_id: &AuditId) -> Option<ProofHash> {
        self.proofs.get(audit_id).copied()
    }

    pub fn is_verified(&self, audit_id: &AuditId) -> Option<bool> {
        self.is_verified.get(audit_id).copied()
    }

    pub fn auditor(&self, audit_id: &AuditId) -> Option<AuditorId> {
        self.auditor_id.get(audit_id).copied()
    }

    /// Number of recorded audits.
    pub fn len(&self) -> usize {
        self.proofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty() && self.is_verified.is_empty() && self.auditor_id.is_empty()
    }

    /// Record one audit in all three maps.
    pub(crate) fn insert(&mut self, audit_id: AuditId, proof: ProofHash, auditor: AuditorId) {
        self.proofs.insert(audit_id, proof);
        self.is_verified.insert(audit_id, true);
        self.auditor_id.insert(audit_id, auditor);
    }

    /// Check that all three maps hold exactly the same keys.
    pub fn check_invariant(&self) -> Result<(), LedgerError> {
        if self.proofs.len() != self.is_verified.len() || self.proofs.len() != self.auditor_id.len()
        {
            return Err(LedgerError::InvariantViolation(format!(
                "map sizes differ: proofs={}, is_verified={}, auditor_id={}",
                self.proofs.len(),
                self.is_verified.len(),
                self.auditor_id.len()
            )));
        }
        for key in self.proofs.keys() {
            if !self.is_verified.contains_key(key) || !self.auditor_id.contains_key(key) {
                return Err(LedgerError::InvariantViolation(format!(
                    "audit {key} missing from a map"
                )));
            }
        }
        Ok(())
    }

    /// Commitment to the ordered contents of all three maps.
    pub fn state_root(&self) -> StateRoot {
        let mut hasher = blake3::Hasher::new_derive_key(STATE_ROOT_CONTEXT);
        hasher.update(&(self.proofs.len() as u64).to_le_bytes());
        for (audit_id, proof) in &self.proofs {
            hasher.update(audit_id.as_bytes());
            hasher.update(proof.as_bytes());
            hasher.update(&[u8::from(self.is_verified.get(audit_id).copied().unwrap_or(false))]);
            hasher.update(self.auditor_id.get(audit_id).unwrap_or(&AuditorId::default()).as_bytes());
        }
        StateRoot(*hasher.finalize().as_bytes())
    }

    /// Encode for transport through the indexer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and validate ledger state received from the network.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let state: Self = serde_json::from_slice(bytes)?;
        state.check_invariant()?;
        Ok(state)
    }

    /// Wire view of the ledger.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            size: self.len() as u64,
            state_root: self.state_root(),
            state: self.clone(),
        }
    }
}

/// Serialized ledger as returned to bridge callers: maps keyed by hex audit id
/// plus the entry count (decimal string) and the state root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(with = "u64_string")]
    pub size: u64,
    pub state_root: StateRoot,
    #[serde(flatten)]
    pub state: LedgerState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> LedgerState {
        let mut state = LedgerState::new();
        state.insert(AuditId([1; 32]), ProofHash([2; 32]), AuditorId([3; 32]));
        state
    }

    #[test]
    fn genesis_is_empty_and_deterministic() {
        let a = LedgerState::new();
        let b = LedgerState::new();
        assert!(a.is_empty());
        assert_eq!(a.len(), b.len());
        assert_eq!(a.state_root(), b.state_root());
    }

    #[test]
    fn root_changes_with_contents() {
        assert_ne!(LedgerState::new().state_root(), populated().state_root());
    }

    #[test]
    fn snapshot_serializes_hex_maps_and_string_size() {
        let snapshot = populated().snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        let key = "01".repeat(32);
        assert_eq!(json["size"], "1");
        assert_eq!(json["proofs"][&key], "02".repeat(32));
        assert_eq!(json["is_verified"][&key], true);
        assert_eq!(json["auditor_id"][&key], "03".repeat(32));
    }

    #[test]
    fn from_bytes_rejects_diverged_maps() {
        let mut json = serde_json::to_value(populated()).unwrap();
        json["auditor_id"] = serde_json::json!({});
        let bytes = serde_json::to_vec(&json).unwrap();
        let err = LedgerState::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
    }

    #[test]
    fn bytes_round_trip_preserves_root() {
        let state = populated();
        let decoded = LedgerState::from_bytes(&state.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.state_root(), state.state_root());
    }
}
