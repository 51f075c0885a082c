//! Confidential audit attestation ledger.
//!
//! An auditor proves that a private risk score meets a public threshold
//! without revealing the score or the exploit payload behind it.
//!
//! # State Model
//!
//! ```text
//! LedgerState = {
//!     proofs:      Map<AuditId, ProofHash>   - H(audit_id, exploit_string)
//!     is_verified: Map<AuditId, bool>
//!     auditor_id:  Map<AuditId, AuditorId>
//! }
//!
//! PrivateState = { exploit_string: [u8; 64], risk_score: u64 }   (never public)
//! ```
//!
//! # Transition
//!
//! `submitAudit(audit_id, auditor_id, threshold)` asserts
//! `risk_score >= threshold` through the witnesses and, on success, inserts
//! `audit_id` into all three maps at once. A failed assertion leaves the
//! ledger unchanged.

pub mod circuit;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod state;
pub mod transition;
pub mod types;
pub mod witness;

pub use circuit::{
    evaluate_submit_audit, proof_commitment, AuditTranscript, CircuitOutput,
    SUBMIT_AUDIT_ENTRY_POINT,
};
pub use contract::{contract_address, ContractAction};
pub use error::{LedgerError, RISK_BELOW_THRESHOLD};
pub use ledger::AuditLedger;
pub use state::{LedgerSnapshot, LedgerState};
pub use transition::{apply_transcript, ResubmissionPolicy};
pub use types::{
    parse_hex_array, parse_hex_vec, serde_helpers, AuditId, AuditorId, ContractAddress, ProofHash,
    StateRoot,
};
pub use witness::{AuditWitnesses, PrivateState, WitnessContext, Witnesses, EXPLOIT_STRING_LEN};
