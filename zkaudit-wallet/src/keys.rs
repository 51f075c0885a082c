//! Deterministic wallet-seed derivation.
//!
//! A 24-word BIP-39 mnemonic is stretched to a 512-bit seed (empty
//! passphrase), fed into a BIP-32 tree, and the private key at
//! [`DERIVATION_PATH`] becomes the wallet seed. A raw 32-byte seed is used
//! verbatim.

use std::fmt;

use bip0039::{English, Mnemonic};
use bip32::{DerivationPath, XPrv};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::WalletError;

/// BIP-44 path of the wallet key (coin type 2400).
pub const DERIVATION_PATH: &str = "m/44'/2400'/0'/0/0";

/// Required mnemonic length.
pub const MNEMONIC_WORDS: usize = 24;

/// Length of a wallet seed in bytes.
pub const SEED_LEN: usize = 32;

/// Environment variable holding the mnemonic. Takes precedence.
pub const ENV_MNEMONIC: &str = "MIDNIGHT_MNEMONIC";
/// Environment variable holding a raw hex seed.
pub const ENV_WALLET_SEED: &str = "MIDNIGHT_WALLET_SEED";

/// 32-byte wallet seed, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WalletSeed([u8; SEED_LEN]);

impl WalletSeed {
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex seed (optional `0x`).
    pub fn from_hex(value: &str) -> Result<Self, WalletError> {
        let trimmed = value.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex_str.len() != SEED_LEN * 2 {
            return Err(WalletError::Credential(format!(
                "wallet seed must be {} hex characters, got {}",
                SEED_LEN * 2,
                hex_str.len()
            )));
        }
        let mut bytes = [0u8; SEED_LEN];
        hex::decode_to_slice(hex_str, &mut bytes)
            .map_err(|e| WalletError::Credential(format!("wallet seed is not valid hex: {e}")))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }

    /// Lowercase hex, as handed to the wallet builder.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0))
    }
}

impl fmt::Debug for WalletSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletSeed(<redacted>)")
    }
}

/// Where the wallet seed comes from.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum WalletCredentials {
    Mnemonic(String),
    Seed(String),
}

impl fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletCredentials::Mnemonic(_) => f.write_str("WalletCredentials::Mnemonic(<redacted>)"),
            WalletCredentials::Seed(_) => f.write_str("WalletCredentials::Seed(<redacted>)"),
        }
    }
}

impl WalletCredentials {
    /// Resolve credentials from the process environment.
    pub fn from_env() -> Result<Self, WalletError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through `lookup`, mnemonic first.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WalletError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(mnemonic) = non_empty(ENV_MNEMONIC) {
            return Ok(WalletCredentials::Mnemonic(mnemonic));
        }
        if let Some(seed) = non_empty(ENV_WALLET_SEED) {
            return Ok(WalletCredentials::Seed(seed));
        }
        Err(WalletError::Credential(format!(
            "neither {ENV_MNEMONIC} nor {ENV_WALLET_SEED} is set"
        )))
    }

    /// Turn the credentials into a wallet seed.
    pub fn derive_seed(&self) -> Result<WalletSeed, WalletError> {
        match self {
            WalletCredentials::Mnemonic(phrase) => derive_wallet_seed(phrase),
            WalletCredentials::Seed(hex_seed) => WalletSeed::from_hex(hex_seed),
        }
    }
}

/// Derive the wallet seed from a 24-word mnemonic.
pub fn derive_wallet_seed(phrase: &str) -> Result<WalletSeed, WalletError> {
    let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
    let words = normalized.split(' ').filter(|w| !w.is_empty()).count();
    if words != MNEMONIC_WORDS {
        return Err(WalletError::Credential(format!(
            "mnemonic must have {MNEMONIC_WORDS} words, got {words}"
        )));
    }

    let mnemonic = Mnemonic::<English>::from_phrase(normalized.as_str())
        .map_err(|e| WalletError::Credential(format!("invalid mnemonic: {e}")))?;
    let bip39_seed = Zeroizing::new(mnemonic.to_seed(""));

    let path: DerivationPath = DERIVATION_PATH
        .parse()
        .map_err(|e| WalletError::Credential(format!("invalid derivation path: {e}")))?;
    let xprv = XPrv::derive_from_path(&bip39_seed[..], &path)
        .map_err(|e| WalletError::Credential(format!("key derivation failed: {e}")))?;

    let key = Zeroizing::new(xprv.to_bytes());
    let seed = WalletSeed::from_bytes(*key);
    tracing::debug!(path = DERIVATION_PATH, "derived wallet seed from mnemonic");
    Ok(seed)
}

/// Public keys and address derived from a wallet seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletKeys {
    pub coin_public_key: String,
    pub encryption_public_key: String,
}

impl WalletKeys {
    pub fn from_seed(seed: &WalletSeed) -> Self {
        let coin = blake3::derive_key("zkaudit 2025 coin public key v1", seed.as_bytes());
        let encryption = blake3::derive_key("zkaudit 2025 encryption public key v1", seed.as_bytes());
        Self {
            coin_public_key: hex::encode(coin),
            encryption_public_key: hex::encode(encryption),
        }
    }

    /// `coin_public_key|encryption_public_key`.
    pub fn address(&self) -> String {
        format!("{}|{}", self.coin_public_key, self.encryption_public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON_ART: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
        abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
        abandon abandon abandon abandon abandon art";

    #[test]
    fn derives_known_seed_from_standard_mnemonic() {
        let seed = derive_wallet_seed(ABANDON_ART).unwrap();
        assert_eq!(
            seed.to_hex().as_str(),
            "af7a998947b1b1fd12d99cb40ee98a739e6a2518d8965690781d85ea0e3a5e13"
        );
    }

    #[test]
    fn derivation_is_deterministic_and_whitespace_tolerant() {
        let spaced = format!("  {}\n", ABANDON_ART.replace(' ', "   "));
        assert_eq!(
            derive_wallet_seed(ABANDON_ART).unwrap(),
            derive_wallet_seed(&spaced).unwrap()
        );
    }

    #[test]
    fn rejects_wrong_word_count() {
        let twelve = "abandon ".repeat(11) + "about";
        let err = derive_wallet_seed(&twelve).unwrap_err();
        assert!(matches!(err, WalletError::Credential(msg) if msg.contains("24 words")));
    }

    #[test]
    fn rejects_bad_checksum() {
        let phrase = "abandon ".repeat(24);
        assert!(matches!(derive_wallet_seed(&phrase), Err(WalletError::Credential(_))));
    }

    #[test]
    fn raw_seed_passes_through_lowercased() {
        let raw = "AF7A998947B1B1FD12D99CB40EE98A739E6A2518D8965690781D85EA0E3A5E13";
        let seed = WalletCredentials::Seed(raw.into()).derive_seed().unwrap();
        assert_eq!(seed.to_hex().as_str(), raw.to_ascii_lowercase());
    }

    #[test]
    fn rejects_malformed_raw_seed() {
        assert!(WalletSeed::from_hex("abcd").is_err());
        assert!(WalletSeed::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn mnemonic_takes_precedence() {
        let creds = WalletCredentials::from_lookup(|key| match key {
            ENV_MNEMONIC => Some(ABANDON_ART.to_string()),
            ENV_WALLET_SEED => Some("00".repeat(32)),
            _ => None,
        })
        .unwrap();
        assert!(matches!(creds, WalletCredentials::Mnemonic(_)));
    }

    #[test]
    fn missing_credentials_fail() {
        let err = WalletCredentials::from_lookup(|_| Some("  ".to_string())).unwrap_err();
        assert!(matches!(err, WalletError::Credential(_)));
    }

    #[test]
    fn public_keys_are_stable_and_distinct() {
        let seed = derive_wallet_seed(ABANDON_ART).unwrap();
        let keys = WalletKeys::from_seed(&seed);
        assert_eq!(keys, WalletKeys::from_seed(&seed));
        assert_ne!(keys.coin_public_key, keys.encryption_public_key);
        assert!(!keys.address().contains(&seed.to_hex().as_str()[..16]));
    }

    #[test]
    fn debug_never_prints_secrets() {
        let seed = WalletSeed::from_bytes([0xAB; 32]);
        assert!(!format!("{seed:?}").contains("ab"));
        let creds = WalletCredentials::Mnemonic(ABANDON_ART.into());
        assert!(!format!("{creds:?}").contains("abandon"));
    }
}
