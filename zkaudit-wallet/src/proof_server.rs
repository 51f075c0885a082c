//! Proof server client.

use async_trait::async_trait;
use url::Url;

use crate::error::WalletError;

/// Turns an unproved transaction body into proof bytes.
#[async_trait]
pub trait Prover: Send + Sync {
    async fn prove(&self, payload: Vec<u8>) -> Result<Vec<u8>, WalletError>;
}

/// HTTP client for a proof server.
#[derive(Clone, Debug)]
pub struct ProofServerClient {
    client: reqwest::Client,
    base: Url,
}

impl ProofServerClient {
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    fn url(&self, path: &str) -> Result<Url, WalletError> {
        self.base
            .join(path)
            .map_err(|e| WalletError::Validation(format!("invalid proof server path '{path}': {e}")))
    }

    /// Whether the proof server answers its health endpoint.
    pub async fn health(&self) -> Result<bool, WalletError> {
        let response = self
            .client
            .get(self.url("health")?)
            .send()
            .await
            .map_err(|e| WalletError::Network(format!("proof server unreachable: {e}")))?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl Prover for ProofServerClient {
    async fn prove(&self, payload: Vec<u8>) -> Result<Vec<u8>, WalletError> {
        let size = payload.len();
        let response = self
            .client
            .post(self.url("prove-tx")?)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(|e| WalletError::Proving(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WalletError::Proving(format!(
                "proof server returned status: {}",
                response.status()
            )));
        }

        let proof = response
            .bytes()
            .await
            .map_err(|e| WalletError::Proving(format!("failed to read proof: {e}")))?;
        tracing::debug!(payload_bytes = size, proof_bytes = proof.len(), "transaction proved");
        Ok(proof.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_onto_base() {
        let client = ProofServerClient::new(Url::parse("http://127.0.0.1:6300").unwrap());
        assert_eq!(client.url("prove-tx").unwrap().as_str(), "http://127.0.0.1:6300/prove-tx");
        assert_eq!(client.url("health").unwrap().as_str(), "http://127.0.0.1:6300/health");
    }
}
