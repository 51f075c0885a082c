//! Local audit ledger: public state plus the private state it is driven by.

use crate::circuit::{evaluate_submit_audit, AuditTranscript, CircuitOutput};
use crate::error::LedgerError;
use crate::state::LedgerState;
use crate::transition::{apply_transcript, ResubmissionPolicy};
use crate::types::{AuditId, AuditorId};
use crate::witness::{AuditWitnesses, PrivateState, Witnesses};

/// A ledger instance evaluated and applied in-process.
///
/// Used by simulators and tests, and by the client to dry-run a submission
/// before paying for a transaction.
#[derive(Clone, Debug)]
pub struct AuditLedger<W: Witnesses = AuditWitnesses> {
    state: LedgerState,
    private_state: PrivateState,
    witnesses: W,
    policy: ResubmissionPolicy,
}

impl AuditLedger<AuditWitnesses> {
    /// Genesis ledger driven by `private_state`.
    pub fn new(private_state: PrivateState) -> Self {
        Self::with_witnesses(AuditWitnesses, private_state)
    }

    /// Wrap an existing public state, e.g. one fetched from the indexer.
    pub fn from_state(state: LedgerState, private_state: PrivateState) -> Self {
        Self {
            state,
            private_state,
            witnesses: AuditWitnesses,
            policy: ResubmissionPolicy::default(),
        }
    }
}

impl<W: Witnesses> AuditLedger<W> {
    pub fn with_witnesses(witnesses: W, private_state: PrivateState) -> Self {
        Self {
            state: LedgerState::new(),
            private_state,
            witnesses,
            policy: ResubmissionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResubmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn private_state(&self) -> &PrivateState {
        &self.private_state
    }

    pub fn policy(&self) -> ResubmissionPolicy {
        self.policy
    }

    /// Replace the private state wholesale. Committed entries are unaffected.
    pub fn switch_private_state(&mut self, private_state: PrivateState) {
        self.private_state = private_state;
    }

    /// Run the circuit without applying it.
    pub fn evaluate(
        &self,
        audit_id: AuditId,
        auditor_id: AuditorId,
        threshold: u64,
    ) -> Result<CircuitOutput, LedgerError> {
        evaluate_submit_audit(
            &self.witnesses,
            &self.state,
            &self.private_state,
            audit_id,
            auditor_id,
            threshold,
            self.policy,
        )
    }

    /// `submitAudit`: evaluate and apply in one step.
    ///
    /// On failure the public state is left exactly as it was.
    pub fn submit_audit(
        &mut self,
        audit_id: AuditId,
        auditor_id: AuditorId,
        threshold: u64,
    ) -> Result<&LedgerState, LedgerError> {
        let output = self.evaluate(audit_id, auditor_id, threshold)?;
        self.apply(&output.transcript)?;
        self.private_state = output.private_state;
        Ok(&self.state)
    }

    /// Apply a transcript produced elsewhere (e.g. observed on the network).
    pub fn apply(&mut self, transcript: &AuditTranscript) -> Result<(), LedgerError> {
        apply_transcript(&mut self.state, transcript, self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_policy_replaces_entries() {
        let mut ledger = AuditLedger::new(PrivateState::new(b"first", 95))
            .with_policy(ResubmissionPolicy::Overwrite);
        let id = AuditId([5; 32]);

        ledger.submit_audit(id, AuditorId([1; 32]), 90).unwrap();
        let first_proof = ledger.state().proof(&id).unwrap();

        ledger.switch_private_state(PrivateState::new(b"second", 99));
        ledger.submit_audit(id, AuditorId([2; 32]), 90).unwrap();

        assert_eq!(ledger.state().len(), 1);
        assert_ne!(ledger.state().proof(&id).unwrap(), first_proof);
        assert_eq!(ledger.state().auditor(&id), Some(AuditorId([2; 32])));
    }

    #[test]
    fn reject_policy_keeps_first_commitment() {
        let mut ledger = AuditLedger::new(PrivateState::new(b"first", 95));
        let id = AuditId([5; 32]);
        ledger.submit_audit(id, AuditorId([1; 32]), 90).unwrap();
        let before = ledger.state().clone();

        let err = ledger.submit_audit(id, AuditorId([2; 32]), 90).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateAudit(id));
        assert_eq!(ledger.state(), &before);
    }
}
