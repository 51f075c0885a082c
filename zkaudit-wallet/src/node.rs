//! Node RPC client.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::WalletError;

/// Accepts serialized transactions for inclusion.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Submit raw transaction bytes and return the node's transaction hash.
    async fn submit(&self, tx: &[u8]) -> Result<String, WalletError>;
}

/// JSON-RPC 2.0 node client.
#[derive(Clone, Debug)]
pub struct NodeClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl NodeClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[async_trait]
impl TransactionSubmitter for NodeClient {
    async fn submit(&self, tx: &[u8]) -> Result<String, WalletError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "author_submitExtrinsic",
            "params": [format!("0x{}", hex::encode(tx))],
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| WalletError::Network(format!("node request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WalletError::Submission(format!(
                "node returned status: {}",
                response.status()
            )));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Network(format!("failed to parse node response: {e}")))?;

        if let Some(err) = rpc.error {
            return Err(WalletError::Submission(format!("{} (code {})", err.message, err.code)));
        }
        rpc.result
            .map(|hash| hash.trim_start_matches("0x").to_string())
            .ok_or_else(|| WalletError::Submission("node returned no transaction hash".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rpc_error() {
        let rpc: RpcResponse = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 1010, "message": "Invalid Transaction" }
        }))
        .unwrap();
        assert!(rpc.result.is_none());
        assert_eq!(rpc.error.unwrap().code, 1010);
    }
}
