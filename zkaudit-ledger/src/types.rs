//! Fixed-width identifiers used on the public ledger.
//!
//! Every identifier is a 32-byte value that travels as lowercase hex on the
//! wire. Parsing accepts an optional `0x` prefix.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// Width of every ledger key and commitment.
pub const ID_LEN: usize = 32;

/// Decode a hex string (optional `0x` prefix) into exactly `N` bytes.
pub fn parse_hex_array<const N: usize>(
    field: &'static str,
    value: &str,
) -> Result<[u8; N], LedgerError> {
    let hex_str = value.strip_prefix("0x").unwrap_or(value);
    if hex_str.len() != N * 2 {
        return Err(LedgerError::InvalidHex {
            field,
            reason: format!("expected {} hex chars, got {}", N * 2, hex_str.len()),
        });
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(hex_str, &mut bytes).map_err(|e| LedgerError::InvalidHex {
        field,
        reason: e.to_string(),
    })?;
    Ok(bytes)
}

/// Decode a variable-length hex string (optional `0x` prefix).
pub fn parse_hex_vec(field: &'static str, value: &str) -> Result<Vec<u8>, LedgerError> {
    let hex_str = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(hex_str).map_err(|e| LedgerError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; ID_LEN]);

        impl $name {
            /// Parse from hex, with or without `0x`.
            pub fn from_hex(value: &str) -> Result<Self, LedgerError> {
                parse_hex_array::<ID_LEN>($field, value).map(Self)
            }

            /// Lowercase hex without prefix.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }
        }

        impl From<[u8; ID_LEN]> for $name {
            fn from(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Self::from_hex(&value).map_err(de::Error::custom)
            }
        }
    };
}

ledger_id!(
    /// Key of every ledger map.
    AuditId,
    "audit_id"
);

ledger_id!(
    /// Identifier of the submitting auditor (e.g. the judge agent's address).
    AuditorId,
    "auditor_id"
);

ledger_id!(
    /// Opaque proof commitment stored in `proofs`.
    ProofHash,
    "proof_hash"
);

ledger_id!(
    /// Commitment to the whole ledger state.
    StateRoot,
    "state_root"
);

ledger_id!(
    /// Network address of a deployed ledger contract.
    ContractAddress,
    "contract_address"
);

/// Serde helpers for wire formats that cannot carry 64-bit integers or raw bytes.
pub mod serde_helpers {
    /// `u64` as a decimal string. Deserialization also accepts a JSON number.
    pub mod u64_string {
        use serde::{de, Deserializer, Serializer};
        use std::fmt;

        pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&value.to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
            struct U64Visitor;

            impl de::Visitor<'_> for U64Visitor {
                type Value = u64;

                fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    f.write_str("an unsigned 64-bit integer or its decimal string")
                }

                fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
                    Ok(v)
                }

                fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
                    u64::try_from(v).map_err(|_| E::custom(format!("negative value {v}")))
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
                    v.trim()
                        .parse()
                        .map_err(|e| E::custom(format!("invalid u64 '{v}': {e}")))
                }
            }

            deserializer.deserialize_any(U64Visitor)
        }
    }

    /// Fixed-size byte arrays as lowercase hex.
    pub mod hex_array {
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer, const N: usize>(
            bytes: &[u8; N],
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&hex::encode(bytes))
        }

        pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
            deserializer: D,
        ) -> Result<[u8; N], D::Error> {
            let value = String::deserialize(deserializer)?;
            crate::types::parse_hex_array::<N>("bytes", &value).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_prefix() {
        let plain = "11".repeat(32);
        let prefixed = format!("0x{plain}");
        assert_eq!(AuditId::from_hex(&plain).unwrap(), AuditId([0x11; 32]));
        assert_eq!(AuditId::from_hex(&prefixed).unwrap(), AuditId([0x11; 32]));
    }

    #[test]
    fn rejects_wrong_length_and_bad_chars() {
        let err = AuditorId::from_hex("abcd").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidHex { field: "auditor_id", .. }));

        let bad = "zz".repeat(32);
        assert!(AuditId::from_hex(&bad).is_err());
    }

    #[test]
    fn serializes_as_lowercase_hex() {
        let id = AuditId([0xAB; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
    }

    #[test]
    fn u64_string_accepts_numbers_and_strings() {
        #[derive(serde::Deserialize, serde::Serialize)]
        struct Wrapper {
            #[serde(with = "serde_helpers::u64_string")]
            value: u64,
        }

        let from_num: Wrapper = serde_json::from_str(r#"{"value": 90}"#).unwrap();
        let from_str: Wrapper =
            serde_json::from_str(r#"{"value": "18446744073709551615"}"#).unwrap();
        assert_eq!(from_num.value, 90);
        assert_eq!(from_str.value, u64::MAX);
        assert_eq!(
            serde_json::to_string(&from_str).unwrap(),
            r#"{"value":"18446744073709551615"}"#
        );
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": -1}"#).is_err());
    }
}
