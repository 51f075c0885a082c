//! Applying circuit transcripts to the public ledger.
//!
//! This is the network-side half of `submitAudit`: a proved transaction
//! carries an [`AuditTranscript`], and the ledger accepts it only if it was
//! evaluated against the current state root and reproduces its claimed next
//! root. Application is all-or-nothing.

use serde::{Deserialize, Serialize};

use crate::circuit::AuditTranscript;
use crate::error::LedgerError;
use crate::state::LedgerState;

/// What to do when an audit id is submitted a second time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResubmissionPolicy {
    /// Refuse the second submission; the first commitment stays authoritative.
    #[default]
    Reject,
    /// Replace the existing entries in all three maps.
    Overwrite,
}

/// Apply a transcript to `state`, leaving it untouched on any error.
pub fn apply_transcript(
    state: &mut LedgerState,
    transcript: &AuditTranscript,
    policy: ResubmissionPolicy,
) -> Result<(), LedgerError> {
    let actual = state.state_root();
    if actual != transcript.prev_root {
        return Err(LedgerError::StaleTranscript {
            expected: transcript.prev_root,
            actual,
        });
    }

    if policy == ResubmissionPolicy::Reject && state.contains(&transcript.audit_id) {
        return Err(LedgerError::DuplicateAudit(transcript.audit_id));
    }

    let mut next = state.clone();
    next.insert(transcript.audit_id, transcript.proof_hash, transcript.auditor_id);
    next.check_invariant()?;

    let computed = next.state_root();
    if computed != transcript.next_root {
        return Err(LedgerError::TranscriptMismatch {
            claimed: transcript.next_root,
            computed,
        });
    }

    *state = next;
    tracing::debug!(audit_id = %transcript.audit_id, root = %computed, "applied audit transcript");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::evaluate_submit_audit;
    use crate::types::{AuditId, AuditorId, ProofHash};
    use crate::witness::{AuditWitnesses, PrivateState};

    fn transcript_for(state: &LedgerState, id: u8) -> AuditTranscript {
        evaluate_submit_audit(
            &AuditWitnesses,
            state,
            &PrivateState::new(b"exploit", 95),
            AuditId([id; 32]),
            AuditorId([0xAA; 32]),
            90,
            ResubmissionPolicy::Reject,
        )
        .unwrap()
        .transcript
    }

    #[test]
    fn applies_fresh_transcript() {
        let mut state = LedgerState::new();
        let transcript = transcript_for(&state, 1);
        apply_transcript(&mut state, &transcript, ResubmissionPolicy::Reject).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.state_root(), transcript.next_root);
    }

    #[test]
    fn rejects_stale_transcript_without_changes() {
        let mut state = LedgerState::new();
        let first = transcript_for(&state, 1);
        let second = transcript_for(&state, 2);
        apply_transcript(&mut state, &first, ResubmissionPolicy::Reject).unwrap();

        let before = state.clone();
        let err = apply_transcript(&mut state, &second, ResubmissionPolicy::Reject).unwrap_err();
        assert!(matches!(err, LedgerError::StaleTranscript { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn rejects_tampered_proof_hash() {
        let mut state = LedgerState::new();
        let mut transcript = transcript_for(&state, 1);
        transcript.proof_hash = ProofHash([0; 32]);
        let err = apply_transcript(&mut state, &transcript, ResubmissionPolicy::Reject).unwrap_err();
        assert!(matches!(err, LedgerError::TranscriptMismatch { .. }));
        assert!(state.is_empty());
    }
}
