//! Private state and the witness accessors that feed it to the circuit.
//!
//! The private state never reaches the public ledger. The circuit reads it
//! only through [`Witnesses`], which hands back the private state unchanged
//! together with the requested value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::LedgerState;
use crate::types::serde_helpers::hex_array;

/// Fixed width of the exploit payload fed to the circuit.
pub const EXPLOIT_STRING_LEN: usize = 64;

/// Data known only to the submitting auditor.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateState {
    /// Exploit payload, zero padded or truncated to 64 bytes.
    #[serde(with = "hex_array")]
    pub exploit_string: [u8; EXPLOIT_STRING_LEN],
    /// Private risk score compared against the public threshold.
    pub risk_score: u64,
}

impl PrivateState {
    /// Build a private state from caller bytes, padding or truncating to 64 bytes.
    pub fn new(exploit: &[u8], risk_score: u64) -> Self {
        let mut exploit_string = [0u8; EXPLOIT_STRING_LEN];
        let len = exploit.len().min(EXPLOIT_STRING_LEN);
        exploit_string[..len].copy_from_slice(&exploit[..len]);
        Self {
            exploit_string,
            risk_score,
        }
    }
}

impl Default for PrivateState {
    /// Zeroed exploit string and a risk score of 0, used at deploy time.
    fn default() -> Self {
        Self {
            exploit_string: [0u8; EXPLOIT_STRING_LEN],
            risk_score: 0,
        }
    }
}

impl fmt::Debug for PrivateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateState").finish_non_exhaustive()
    }
}

/// Immutable view handed to each witness call.
#[derive(Clone, Copy)]
pub struct WitnessContext<'a> {
    pub ledger: &'a LedgerState,
    pub private_state: &'a PrivateState,
}

impl<'a> WitnessContext<'a> {
    pub fn new(ledger: &'a LedgerState, private_state: &'a PrivateState) -> Self {
        Self {
            ledger,
            private_state,
        }
    }
}

/// Accessors through which the circuit obtains private inputs.
///
/// Each accessor returns the (unchanged) private state together with the value.
pub trait Witnesses {
    fn exploit_string(&self, ctx: &WitnessContext<'_>) -> (PrivateState, [u8; EXPLOIT_STRING_LEN]);

    fn risk_score(&self, ctx: &WitnessContext<'_>) -> (PrivateState, u64);
}

/// The production witness set: plain reads of the private state.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuditWitnesses;

impl Witnesses for AuditWitnesses {
    fn exploit_string(&self, ctx: &WitnessContext<'_>) -> (PrivateState, [u8; EXPLOIT_STRING_LEN]) {
        (ctx.private_state.clone(), ctx.private_state.exploit_string)
    }

    fn risk_score(&self, ctx: &WitnessContext<'_>) -> (PrivateState, u64) {
        (ctx.private_state.clone(), ctx.private_state.risk_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_exploit_strings() {
        let state = PrivateState::new(b"reentrancy", 90);
        assert_eq!(&state.exploit_string[..10], b"reentrancy");
        assert!(state.exploit_string[10..].iter().all(|b| *b == 0));
    }

    #[test]
    fn truncates_long_exploit_strings() {
        let long = vec![7u8; 100];
        let state = PrivateState::new(&long, 1);
        assert_eq!(state.exploit_string, [7u8; EXPLOIT_STRING_LEN]);
    }

    #[test]
    fn accessors_return_state_unchanged() {
        let ledger = LedgerState::new();
        let private = PrivateState::new(b"payload", 42);
        let ctx = WitnessContext::new(&ledger, &private);

        let (after, score) = AuditWitnesses.risk_score(&ctx);
        assert_eq!(after, private);
        assert_eq!(score, 42);

        let (after, exploit) = AuditWitnesses.exploit_string(&ctx);
        assert_eq!(after, private);
        assert_eq!(exploit, private.exploit_string);

        // Same context, same answer.
        assert_eq!(AuditWitnesses.risk_score(&ctx), AuditWitnesses.risk_score(&ctx));
    }

    #[test]
    fn debug_output_hides_private_values() {
        let private = PrivateState::new(b"secret-exploit", 77);
        let rendered = format!("{private:?}");
        assert!(!rendered.contains("77"));
        assert!(!rendered.contains("secret"));
    }
}
