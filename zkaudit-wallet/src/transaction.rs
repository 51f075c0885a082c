//! Transaction artifacts moving through the pipeline.
//!
//! ```text
//! UnbalancedTransaction --serialize(network)--> bytes
//!     --WalletTransaction::from_ledger_bytes--> wallet-native
//!     --balance--> --prove--> BalancedTransaction --submit--> TxReceipt
//! ```
//!
//! Each stage consumes its input by value.

use serde::{Deserialize, Serialize};
use zkaudit_ledger::serde_helpers::{hex_array, u64_string};

use crate::error::WalletError;
use crate::network::NetworkId;

/// Token type of the native fee token.
pub const NATIVE_TOKEN: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Flat fee charged for every contract transaction.
pub const DEFAULT_FEE: u64 = 1_000;

/// Network-tagged wire envelope shared by both representations.
#[derive(Serialize, Deserialize)]
struct Envelope {
    network_id: NetworkId,
    payload: Vec<u8>,
}

fn wrap(network_id: NetworkId, payload: Vec<u8>) -> Result<Vec<u8>, WalletError> {
    Ok(bincode::serialize(&Envelope { network_id, payload })?)
}

fn unwrap_checked(bytes: &[u8], expected: NetworkId) -> Result<Vec<u8>, WalletError> {
    let envelope: Envelope = bincode::deserialize(bytes)?;
    if envelope.network_id != expected {
        return Err(WalletError::NetworkIdMismatch {
            expected,
            actual: envelope.network_id,
        });
    }
    Ok(envelope.payload)
}

/// A coin owned by (or created for) the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    #[serde(with = "hex_array")]
    pub nonce: [u8; 32],
    /// Hex token type; [`NATIVE_TOKEN`] for the fee token.
    pub token_type: String,
    pub value: u64,
}

impl CoinInfo {
    /// Fresh native coin with a random nonce.
    pub fn native(value: u64) -> Self {
        Self {
            nonce: rand::random(),
            token_type: NATIVE_TOKEN.to_string(),
            value,
        }
    }

    pub fn is_native(&self) -> bool {
        self.token_type == NATIVE_TOKEN
    }
}

/// An unproved contract call in ledger representation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbalancedTransaction {
    network_id: NetworkId,
    /// Encoded contract action; opaque to the wallet.
    intent: Vec<u8>,
    fee: u64,
}

impl UnbalancedTransaction {
    pub fn new(network_id: NetworkId, intent: Vec<u8>) -> Self {
        Self {
            network_id,
            intent,
            fee: DEFAULT_FEE,
        }
    }

    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn intent(&self) -> &[u8] {
        &self.intent
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    /// Ledger-representation bytes under this transaction's network id.
    pub fn serialize(&self) -> Result<Vec<u8>, WalletError> {
        let body = bincode::serialize(&(&self.intent, self.fee))?;
        wrap(self.network_id, body)
    }
}

/// Wallet-native transaction: the call plus balancing inputs, outputs and proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub network_id: NetworkId,
    pub intent: Vec<u8>,
    pub fee: u64,
    pub inputs: Vec<CoinInfo>,
    pub outputs: Vec<CoinInfo>,
    pub proof: Option<Vec<u8>>,
}

impl WalletTransaction {
    /// Decode ledger-representation bytes, rejecting another network's transaction.
    pub fn from_ledger_bytes(bytes: &[u8], expected: NetworkId) -> Result<Self, WalletError> {
        let payload = unwrap_checked(bytes, expected)?;
        let (intent, fee): (Vec<u8>, u64) = bincode::deserialize(&payload)?;
        Ok(Self {
            network_id: expected,
            intent,
            fee,
            inputs: Vec::new(),
            outputs: Vec::new(),
            proof: None,
        })
    }

    /// Sum of native input value minus native outputs.
    pub fn native_surplus(&self) -> i128 {
        let sum = |coins: &[CoinInfo]| -> i128 {
            coins
                .iter()
                .filter(|c| c.is_native())
                .map(|c| i128::from(c.value))
                .sum()
        };
        sum(&self.inputs) - sum(&self.outputs)
    }

    /// Inputs cover outputs plus the fee.
    pub fn is_balanced(&self) -> bool {
        self.native_surplus() == i128::from(self.fee)
    }

    pub fn is_proved(&self) -> bool {
        self.proof.is_some()
    }

    /// Body sent to the proof server (everything except the proof).
    pub fn proving_payload(&self) -> Result<Vec<u8>, WalletError> {
        let unproved = Self {
            proof: None,
            ..self.clone()
        };
        wrap(self.network_id, bincode::serialize(&unproved)?)
    }

    /// Ledger-representation bytes of the finished transaction.
    pub fn serialize(&self) -> Result<Vec<u8>, WalletError> {
        wrap(self.network_id, bincode::serialize(self)?)
    }

    /// Decode a finished transaction, e.g. on the receiving node.
    pub fn deserialize(bytes: &[u8], expected: NetworkId) -> Result<Self, WalletError> {
        let payload = unwrap_checked(bytes, expected)?;
        Ok(bincode::deserialize(&payload)?)
    }
}

/// A balanced and proved transaction, ready to submit.
///
/// Only the pipeline can construct one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalancedTransaction {
    network_id: NetworkId,
    bytes: Vec<u8>,
    tx_id: String,
}

impl BalancedTransaction {
    pub(crate) fn from_wallet(tx: &WalletTransaction) -> Result<Self, WalletError> {
        if !tx.is_balanced() {
            return Err(WalletError::Validation("transaction is not balanced".into()));
        }
        if !tx.is_proved() {
            return Err(WalletError::Validation("transaction is not proved".into()));
        }
        let bytes = tx.serialize()?;
        let tx_id = transaction_id(&bytes);
        Ok(Self {
            network_id: tx.network_id,
            bytes,
            tx_id,
        })
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex transaction identifier.
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Decode the wallet-native form.
    pub fn decode(&self) -> Result<WalletTransaction, WalletError> {
        WalletTransaction::deserialize(&self.bytes, self.network_id)
    }
}

/// Hex BLAKE3 hash of serialized transaction bytes.
pub fn transaction_id(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Result of a finalized submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: String,
    #[serde(with = "u64_string")]
    pub block_height: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_network_id_mismatch() {
        let tx = UnbalancedTransaction::new(NetworkId::DevNet, b"call".to_vec());
        let bytes = tx.serialize().unwrap();
        let err = WalletTransaction::from_ledger_bytes(&bytes, NetworkId::TestNet).unwrap_err();
        assert!(matches!(
            err,
            WalletError::NetworkIdMismatch {
                expected: NetworkId::TestNet,
                actual: NetworkId::DevNet
            }
        ));
    }

    #[test]
    fn ledger_bytes_decode_into_unbalanced_wallet_tx() {
        let tx = UnbalancedTransaction::new(NetworkId::TestNet, b"call".to_vec()).with_fee(7);
        let wallet_tx = WalletTransaction::from_ledger_bytes(&tx.serialize().unwrap(), NetworkId::TestNet)
            .unwrap();
        assert_eq!(wallet_tx.intent, b"call");
        assert_eq!(wallet_tx.fee, 7);
        assert!(!wallet_tx.is_balanced());
        assert!(!wallet_tx.is_proved());
    }

    #[test]
    fn balanced_requires_proof_and_balance() {
        let mut tx = WalletTransaction {
            network_id: NetworkId::TestNet,
            intent: vec![1],
            fee: 10,
            inputs: vec![CoinInfo::native(25)],
            outputs: vec![CoinInfo::native(15)],
            proof: None,
        };
        assert!(tx.is_balanced());
        assert!(BalancedTransaction::from_wallet(&tx).is_err());

        tx.proof = Some(vec![0xFF]);
        let balanced = BalancedTransaction::from_wallet(&tx).unwrap();
        assert_eq!(balanced.tx_id().len(), 64);
        assert_eq!(balanced.decode().unwrap(), tx);
    }

    #[test]
    fn receipt_height_is_a_string() {
        let receipt = TxReceipt {
            tx_id: "ab".into(),
            block_height: 42,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["block_height"], "42");
    }
}
