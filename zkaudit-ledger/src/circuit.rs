//! The `submitAudit` circuit.
//!
//! Evaluation is pure: it reads the public ledger and the private witness and
//! produces an [`AuditTranscript`] holding only public values. The transcript
//! is what travels inside a transaction; the network applies it with
//! [`crate::transition::apply_transcript`].

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, RISK_BELOW_THRESHOLD};
use crate::state::LedgerState;
use crate::transition::ResubmissionPolicy;
use crate::types::{serde_helpers::u64_string, AuditId, AuditorId, ProofHash, StateRoot};
use crate::witness::{PrivateState, WitnessContext, Witnesses, EXPLOIT_STRING_LEN};

/// BLAKE3 derive-key context for proof commitments.
const PROOF_COMMITMENT_CONTEXT: &str = "zkaudit 2025 submitAudit proof commitment v1";

/// Name of the circuit entry point as carried in contract calls.
pub const SUBMIT_AUDIT_ENTRY_POINT: &str = "submitAudit";

/// Public outputs of one `submitAudit` evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTranscript {
    pub audit_id: AuditId,
    pub auditor_id: AuditorId,
    #[serde(with = "u64_string")]
    pub threshold: u64,
    pub proof_hash: ProofHash,
    /// Ledger root the circuit was evaluated against.
    pub prev_root: StateRoot,
    /// Ledger root after the transcript is applied.
    pub next_root: StateRoot,
}

/// Transcript plus the private state handed back by the witnesses.
#[derive(Clone, Debug)]
pub struct CircuitOutput {
    pub transcript: AuditTranscript,
    pub private_state: PrivateState,
}

/// `H(audit_id, exploit_string)`. The risk score is never an input.
pub fn proof_commitment(audit_id: &AuditId, exploit_string: &[u8; EXPLOIT_STRING_LEN]) -> ProofHash {
    let mut hasher = blake3::Hasher::new_derive_key(PROOF_COMMITMENT_CONTEXT);
    hasher.update(audit_id.as_bytes());
    hasher.update(exploit_string);
    ProofHash(*hasher.finalize().as_bytes())
}

/// Evaluate `submitAudit` against `ledger` with the given private state.
///
/// Fails with [`LedgerError::AssertionFailure`] when the witnessed risk score is
/// below `threshold`. Never touches `ledger`.
pub fn evaluate_submit_audit<W: Witnesses>(
    witnesses: &W,
    ledger: &LedgerState,
    private_state: &PrivateState,
    audit_id: AuditId,
    auditor_id: AuditorId,
    threshold: u64,
    policy: ResubmissionPolicy,
) -> Result<CircuitOutput, LedgerError> {
    let ctx = WitnessContext::new(ledger, private_state);

    let (private_state, risk_score) = witnesses.risk_score(&ctx);
    if risk_score < threshold {
        return Err(LedgerError::AssertionFailure(RISK_BELOW_THRESHOLD.to_string()));
    }

    let ctx = WitnessContext::new(ledger, &private_state);
    let (private_state, exploit_string) = witnesses.exploit_string(&ctx);

    if policy == ResubmissionPolicy::Reject && ledger.contains(&audit_id) {
        return Err(LedgerError::DuplicateAudit(audit_id));
    }

    let proof_hash = proof_commitment(&audit_id, &exploit_string);

    let mut next = ledger.clone();
    next.insert(audit_id, proof_hash, auditor_id);

    Ok(CircuitOutput {
        transcript: AuditTranscript {
            audit_id,
            auditor_id,
            threshold,
            proof_hash,
            prev_root: ledger.state_root(),
            next_root: next.state_root(),
        },
        private_state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::witness::AuditWitnesses;

    fn evaluate(risk: u64, threshold: u64) -> Result<CircuitOutput, LedgerError> {
        evaluate_submit_audit(
            &AuditWitnesses,
            &LedgerState::new(),
            &PrivateState::new(b"overflow in withdraw()", risk),
            AuditId([9; 32]),
            AuditorId([8; 32]),
            threshold,
            ResubmissionPolicy::Reject,
        )
    }

    #[test]
    fn boundary_equality_passes() {
        assert!(evaluate(90, 90).is_ok());
    }

    #[test]
    fn below_threshold_fails_with_assert_text() {
        let err = evaluate(85, 90).unwrap_err();
        assert_eq!(err, LedgerError::AssertionFailure("risk_score < threshold".into()));
        assert_eq!(err.to_string(), "failed assert: risk_score < threshold");
    }

    #[test]
    fn transcript_carries_no_risk_score() {
        let output = evaluate(31_337, 90).unwrap();
        let json = serde_json::to_string(&output.transcript).unwrap();
        assert!(!json.contains("31337"));
        assert!(!json.contains("risk"));
    }

    #[test]
    fn commitment_depends_on_exploit_string() {
        let id = AuditId([1; 32]);
        let a = proof_commitment(&id, &PrivateState::new(b"a", 0).exploit_string);
        let b = proof_commitment(&id, &PrivateState::new(b"b", 0).exploit_string);
        assert_ne!(a, b);
    }

    #[test]
    fn commitment_ignores_risk_score() {
        let id = AuditId([1; 32]);
        let low = PrivateState::new(b"same", 1);
        let high = PrivateState::new(b"same", 1_000);
        assert_eq!(
            proof_commitment(&id, &low.exploit_string),
            proof_commitment(&id, &high.exploit_string)
        );
    }
}
