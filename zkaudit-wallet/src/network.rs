//! Network identity and service endpoints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::WalletError;

/// Testnet indexer GraphQL endpoint.
pub const DEFAULT_INDEXER: &str = "https://indexer.testnet-02.midnight.network/api/v1/graphql";
/// Testnet indexer subscription endpoint.
pub const DEFAULT_INDEXER_WS: &str = "wss://indexer.testnet-02.midnight.network/api/v1/graphql/ws";
/// Testnet node RPC endpoint.
pub const DEFAULT_NODE: &str = "https://rpc.testnet-02.midnight.network";
/// Locally running proof server.
pub const DEFAULT_PROOF_SERVER: &str = "http://127.0.0.1:6300";

/// Network every transaction is tagged with.
///
/// Passed explicitly to every component that serializes transactions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Undeployed,
    DevNet,
    #[default]
    TestNet,
    MainNet,
}

impl NetworkId {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::Undeployed => "undeployed",
            NetworkId::DevNet => "devnet",
            NetworkId::TestNet => "testnet",
            NetworkId::MainNet => "mainnet",
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "undeployed" | "local" => Ok(NetworkId::Undeployed),
            "devnet" => Ok(NetworkId::DevNet),
            "testnet" | "testnet-02" => Ok(NetworkId::TestNet),
            "mainnet" => Ok(NetworkId::MainNet),
            other => Err(WalletError::Validation(format!("unknown network id '{other}'"))),
        }
    }
}

/// Service endpoints a wallet is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub indexer: Url,
    pub indexer_ws: Url,
    pub proof_server: Url,
    pub node: Url,
}

impl Endpoints {
    /// Parse and validate all four endpoints.
    pub fn parse(
        indexer: &str,
        indexer_ws: &str,
        proof_server: &str,
        node: &str,
    ) -> Result<Self, WalletError> {
        Ok(Self {
            indexer: parse_url("indexer", indexer)?,
            indexer_ws: parse_url("indexer websocket", indexer_ws)?,
            proof_server: parse_url("proof server", proof_server)?,
            node: parse_url("node", node)?,
        })
    }

    /// Public testnet endpoints with a local proof server.
    pub fn testnet() -> Result<Self, WalletError> {
        Self::parse(DEFAULT_INDEXER, DEFAULT_INDEXER_WS, DEFAULT_PROOF_SERVER, DEFAULT_NODE)
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, WalletError> {
    Url::parse(value).map_err(|e| WalletError::Validation(format!("invalid {name} URL '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_network_ids() {
        assert_eq!("testnet".parse::<NetworkId>().unwrap(), NetworkId::TestNet);
        assert_eq!("TestNet".parse::<NetworkId>().unwrap(), NetworkId::TestNet);
        assert_eq!("undeployed".parse::<NetworkId>().unwrap(), NetworkId::Undeployed);
        assert!("moonnet".parse::<NetworkId>().is_err());
    }

    #[test]
    fn testnet_endpoints_are_valid() {
        let endpoints = Endpoints::testnet().unwrap();
        assert_eq!(endpoints.proof_server.port(), Some(6300));
        assert_eq!(endpoints.indexer_ws.scheme(), "wss");
    }

    #[test]
    fn rejects_bad_urls() {
        let err = Endpoints::parse("not a url", DEFAULT_INDEXER_WS, DEFAULT_PROOF_SERVER, DEFAULT_NODE)
            .unwrap_err();
        assert!(err.to_string().contains("indexer"));
    }
}
