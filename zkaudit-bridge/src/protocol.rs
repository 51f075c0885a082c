//! JSON command protocol.
//!
//! Every command takes a JSON payload and produces one JSON object with a
//! `success` flag. Failures carry `error` and `error_kind` plus whatever
//! context the command can still report, e.g. the unchanged ledger after a
//! failed assertion. Integers leave as decimal strings, bytes as lowercase hex.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use zkaudit_ledger::serde_helpers::u64_string;
use zkaudit_ledger::{
    parse_hex_vec, AuditId, AuditorId, ContractAddress, LedgerError, LedgerSnapshot, PrivateState,
};
use zkaudit_wallet::{
    Indexer, IndexerClient, RemoteWalletBuilder, WalletCredentials, WalletError, WalletKeys,
};

use crate::config::BridgeConfig;
use crate::contract::IndexerDataProvider;
use crate::error::BridgeError;
use crate::health::network_health;
use crate::private_state::SledPrivateStateStore;
use crate::record::{RecordStore, SessionRecord};
use crate::session::{AuditSubmission, ContractSession, SessionContext};

pub const DEPLOYED_MESSAGE: &str = "Contract deployed successfully";
pub const JOINED_MESSAGE: &str = "Connected to contract successfully";
pub const INIT_FAILED_MESSAGE: &str = "Failed to initialize contract";
pub const INVALID_INIT: &str = "Invalid mode or missing contract_address";

/// Bridge commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Init,
    SubmitAudit,
    QueryAudit,
    GetLedger,
    NetworkHealth,
    WalletBalance,
    WalletAddress,
    QueryTransaction,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::SubmitAudit => "submit_audit",
            Operation::QueryAudit => "query_audit",
            Operation::GetLedger => "get_ledger",
            Operation::NetworkHealth => "network_health",
            Operation::WalletBalance => "wallet_balance",
            Operation::WalletAddress => "wallet_address",
            Operation::QueryTransaction => "query_transaction",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Operation::Init),
            "submit_audit" => Ok(Operation::SubmitAudit),
            "query_audit" => Ok(Operation::QueryAudit),
            "get_ledger" => Ok(Operation::GetLedger),
            "network_health" => Ok(Operation::NetworkHealth),
            "wallet_balance" => Ok(Operation::WalletBalance),
            "wallet_address" => Ok(Operation::WalletAddress),
            "query_transaction" => Ok(Operation::QueryTransaction),
            other => Err(BridgeError::Validation(format!("Unknown operation: {other}"))),
        }
    }
}

// === Requests ===

#[derive(Debug, Deserialize)]
pub struct InitRequest {
    pub mode: String,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAuditRequest {
    pub audit_id: String,
    #[serde(alias = "auditor_id")]
    pub auditor_addr: String,
    #[serde(with = "u64_string")]
    pub threshold: u64,
    pub witness: WitnessPayload,
}

#[derive(Debug, Deserialize)]
pub struct WitnessPayload {
    /// Hex, padded with zeros or truncated to 64 bytes.
    pub exploit_string: String,
    #[serde(with = "u64_string")]
    pub risk_score: u64,
}

#[derive(Debug, Deserialize)]
pub struct QueryAuditRequest {
    pub audit_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkHealthRequest {
    #[serde(default, with = "optional_u64")]
    pub blocks: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct QueryTransactionRequest {
    pub hash: String,
}

impl SubmitAuditRequest {
    fn into_submission(self) -> Result<AuditSubmission, BridgeError> {
        let exploit = parse_hex_vec("exploit_string", &self.witness.exploit_string)?;
        Ok(AuditSubmission {
            audit_id: AuditId::from_hex(&self.audit_id)?,
            auditor_id: AuditorId::from_hex(&self.auditor_addr)?,
            threshold: self.threshold,
            private_state: PrivateState::new(&exploit, self.witness.risk_score),
        })
    }
}

mod optional_u64 {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    struct Wrapper(#[serde(with = "zkaudit_ledger::serde_helpers::u64_string")] u64);

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
    }
}

// === Responses ===

#[derive(Debug, Serialize)]
struct InitResponse {
    contract_address: String,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "optional_u64_string")]
    block_height: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SubmitAuditResponse {
    transaction_id: String,
    #[serde(with = "u64_string")]
    block_height: u64,
    ledger_state: LedgerSnapshot,
}

#[derive(Debug, Serialize)]
struct QueryAuditResponse {
    found: bool,
    audit_id: String,
    proof_hash: Option<String>,
    is_verified: bool,
}

#[derive(Debug, Serialize)]
struct LedgerResponse {
    contract_address: String,
    ledger_state: LedgerSnapshot,
}

#[derive(Debug, Serialize)]
struct WalletBalanceResponse {
    address: String,
    balances: BTreeMap<String, String>,
    available_coins: String,
    pending_coins: String,
    total_coins: String,
    synced: bool,
}

#[derive(Debug, Serialize)]
struct WalletAddressResponse {
    address: String,
    coin_public_key: String,
    encryption_public_key: String,
}

#[derive(Debug, Serialize)]
struct BlockResponse {
    #[serde(with = "u64_string")]
    height: u64,
    hash: String,
    #[serde(with = "u64_string")]
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct QueryTransactionResponse {
    found: bool,
    hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    apply_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    succeeded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block: Option<BlockResponse>,
}

mod optional_u64_string {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

/// A failed command: the error plus context fields merged into the response.
#[derive(Debug)]
pub struct Failure {
    pub error: BridgeError,
    pub context: Map<String, Value>,
}

impl Failure {
    fn with(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }
}

macro_rules! failure_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for Failure {
                fn from(error: $source) -> Self {
                    Self {
                        error: error.into(),
                        context: Map::new(),
                    }
                }
            }
        )*
    };
}

failure_from!(BridgeError, LedgerError, WalletError, serde_json::Error);

fn success<T: Serialize>(body: &T) -> Result<Value, Failure> {
    let mut object = match serde_json::to_value(body)? {
        Value::Object(object) => object,
        other => {
            let mut object = Map::new();
            object.insert("result".into(), other);
            object
        }
    };
    object.insert("success".into(), Value::Bool(true));
    Ok(Value::Object(object))
}

/// Response for an error raised outside any command, e.g. while loading configuration.
pub fn error_response(error: BridgeError) -> Value {
    failure(Failure::from(error))
}

fn failure(failure: Failure) -> Value {
    let mut object = failure.context;
    object.insert("success".into(), Value::Bool(false));
    object.insert("error".into(), Value::String(failure.error.to_string()));
    object.insert("error_kind".into(), Value::String(failure.error.kind().to_string()));
    Value::Object(object)
}

fn parse_request<T: DeserializeOwned>(operation: Operation, payload: Value) -> Result<T, BridgeError> {
    serde_json::from_value(payload)
        .map_err(|e| BridgeError::Validation(format!("invalid {operation} payload: {e}")))
}

// === Credentials ===

/// Supplies wallet credentials on demand.
pub trait CredentialSource: Send + Sync {
    fn credentials(&self) -> Result<WalletCredentials, WalletError>;
}

/// Reads `MIDNIGHT_MNEMONIC` / `MIDNIGHT_WALLET_SEED` at call time.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn credentials(&self) -> Result<WalletCredentials, WalletError> {
        WalletCredentials::from_env()
    }
}

impl CredentialSource for WalletCredentials {
    fn credentials(&self) -> Result<WalletCredentials, WalletError> {
        Ok(self.clone())
    }
}

// === Bridge ===

/// Dispatches commands against one session record and its collaborators.
pub struct Bridge {
    ctx: SessionContext,
    indexer: Arc<dyn Indexer>,
    records: RecordStore,
    credentials: Arc<dyn CredentialSource>,
}

impl Bridge {
    pub fn new(
        ctx: SessionContext,
        indexer: Arc<dyn Indexer>,
        records: RecordStore,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            ctx,
            indexer,
            records,
            credentials,
        }
    }

    /// Wire the HTTP clients, sled store and session record described by `config`.
    ///
    /// The sled directory is only opened by commands that read or write
    /// private state, and only while they hold the exclusive record lock.
    pub fn from_config(config: BridgeConfig) -> Result<Self, BridgeError> {
        let indexer: Arc<dyn Indexer> = Arc::new(IndexerClient::new(config.endpoints.indexer.clone()));
        let private_states = SledPrivateStateStore::at(config.private_state_dir.clone());
        let records = RecordStore::new(config.state_file.clone());
        let ctx = SessionContext {
            public_data: Arc::new(IndexerDataProvider::new(indexer.clone())),
            private_states: Arc::new(private_states),
            wallet_builder: Arc::new(RemoteWalletBuilder),
            config,
        };
        Ok(Self::new(ctx, indexer, records, Arc::new(EnvCredentials)))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.ctx.config
    }

    /// Run `operation` and render its JSON response. Never fails.
    #[instrument(skip(self, payload))]
    pub async fn handle(&self, operation: &str, payload: Value) -> Value {
        let result = match operation.parse::<Operation>() {
            Ok(op) => self.dispatch(op, payload).await,
            Err(e) => Err(Failure::from(e)),
        };
        match result {
            Ok(response) => response,
            Err(f) => {
                warn!(operation, kind = f.error.kind(), error = %f.error, "command failed");
                failure(f)
            }
        }
    }

    async fn dispatch(&self, op: Operation, payload: Value) -> Result<Value, Failure> {
        match op {
            Operation::Init => self.init(parse_request(op, payload)?).await,
            Operation::SubmitAudit => self.submit_audit(parse_request(op, payload)?).await,
            Operation::QueryAudit => {
                let request: QueryAuditRequest = parse_request(op, payload)
                    .map_err(|e| Failure::from(e).with("found", Value::Bool(false)))?;
                self.query_audit(request)
                    .await
                    .map_err(|f| f.with("found", Value::Bool(false)))
            }
            Operation::GetLedger => self.get_ledger().await,
            Operation::NetworkHealth => {
                let request: NetworkHealthRequest = parse_request(op, payload)?;
                let blocks = request.blocks.unwrap_or(self.ctx.config.health_sample);
                success(&network_health(self.indexer.as_ref(), blocks).await?)
            }
            Operation::WalletBalance => self.wallet_balance().await,
            Operation::WalletAddress => {
                let seed = self.credentials.credentials()?.derive_seed()?;
                let keys = WalletKeys::from_seed(&seed);
                success(&WalletAddressResponse {
                    address: keys.address(),
                    coin_public_key: keys.coin_public_key,
                    encryption_public_key: keys.encryption_public_key,
                })
            }
            Operation::QueryTransaction => self.query_transaction(parse_request(op, payload)?).await,
        }
    }

    /// Context bound to the environment a session was created for.
    fn context_for(&self, environment: &str) -> Result<SessionContext, BridgeError> {
        if environment == self.ctx.config.environment {
            return Ok(self.ctx.clone());
        }
        Ok(SessionContext {
            config: self.ctx.config.for_environment(environment)?,
            ..self.ctx.clone()
        })
    }

    async fn init(&self, request: InitRequest) -> Result<Value, Failure> {
        let with_message = |error: BridgeError| {
            Failure::from(error).with("message", Value::String(INIT_FAILED_MESSAGE.into()))
        };

        let environment = self
            .ctx
            .config
            .session_environment(request.environment.as_deref());
        let ctx = self.context_for(&environment).map_err(with_message)?;

        let lock = self.records.lock_exclusive().map_err(with_message)?;
        let response = self.open_session(ctx, &request).await.map_err(with_message)?;
        self.records
            .write(
                &lock,
                &SessionRecord {
                    contract_address: response.contract_address.clone(),
                    environment,
                },
            )
            .map_err(with_message)?;

        info!(address = %response.contract_address, message = response.message, "session initialized");
        success(&response)
    }

    async fn open_session(&self, ctx: SessionContext, request: &InitRequest) -> Result<InitResponse, BridgeError> {
        match (request.mode.as_str(), request.contract_address.as_deref()) {
            ("deploy", _) => {
                let credentials = self.credentials.credentials()?;
                let (session, receipt) = ContractSession::deploy(ctx, &credentials).await?;
                let address = session.address();
                close_quietly(session).await;
                Ok(InitResponse {
                    contract_address: address.to_hex(),
                    message: DEPLOYED_MESSAGE,
                    transaction_id: Some(receipt.tx_id),
                    block_height: Some(receipt.block_height),
                })
            }
            ("join", Some(address)) => {
                let address = ContractAddress::from_hex(address)?;
                let credentials = self.credentials.credentials()?;
                let session = ContractSession::join(ctx, address, Some(&credentials)).await?;
                close_quietly(session).await;
                Ok(InitResponse {
                    contract_address: address.to_hex(),
                    message: JOINED_MESSAGE,
                    transaction_id: None,
                    block_height: None,
                })
            }
            _ => Err(BridgeError::Validation(INVALID_INIT.into())),
        }
    }

    async fn submit_audit(&self, request: SubmitAuditRequest) -> Result<Value, Failure> {
        let submission = request.into_submission()?;

        let lock = self.records.lock_exclusive()?;
        let record = self.records.read(&lock)?;
        let ctx = self.context_for(&record.environment)?;
        let address = ContractAddress::from_hex(&record.contract_address)?;

        let credentials = self.credentials.credentials()?;
        let mut session = ContractSession::join(ctx, address, Some(&credentials)).await?;

        let outcome = match session.submit_audit(submission).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let mut f = Failure::from(error);
                let snapshot = session
                    .ledger_state()
                    .await
                    .and_then(|ledger| serde_json::to_value(ledger.snapshot()).map_err(BridgeError::from));
                match snapshot {
                    Ok(snapshot) => f = f.with("ledger_state", snapshot),
                    Err(e) => warn!(error = %e, "could not attach ledger snapshot to failure"),
                }
                close_quietly(session).await;
                return Err(f);
            }
        };
        close_quietly(session).await;
        drop(lock);

        success(&SubmitAuditResponse {
            transaction_id: outcome.receipt.tx_id,
            block_height: outcome.receipt.block_height,
            ledger_state: outcome.ledger.snapshot(),
        })
    }

    /// Read-only session for the recorded contract.
    async fn join_recorded(&self) -> Result<ContractSession, BridgeError> {
        let record = {
            let lock = self.records.lock_shared()?;
            self.records.read(&lock)?
        };
        let ctx = self.context_for(&record.environment)?;
        let address = ContractAddress::from_hex(&record.contract_address)?;
        ContractSession::join(ctx, address, None).await
    }

    async fn query_audit(&self, request: QueryAuditRequest) -> Result<Value, Failure> {
        let audit_id = AuditId::from_hex(&request.audit_id)?;
        let session = self.join_recorded().await?;
        let record = session.query_audit(&audit_id).await?;
        success(&QueryAuditResponse {
            found: record.found,
            audit_id: audit_id.to_hex(),
            proof_hash: record.proof_hash,
            is_verified: record.is_verified,
        })
    }

    async fn get_ledger(&self) -> Result<Value, Failure> {
        let session = self.join_recorded().await?;
        let ledger = session.ledger_state().await?;
        success(&LedgerResponse {
            contract_address: session.address().to_hex(),
            ledger_state: ledger.snapshot(),
        })
    }

    async fn wallet_balance(&self) -> Result<Value, Failure> {
        let credentials = self.credentials.credentials()?;
        let (pipeline, state) = self.ctx.sync_wallet(&credentials).await?;
        if let Err(e) = pipeline.wallet().close().await {
            warn!(error = %e, "failed to close wallet");
        }
        success(&WalletBalanceResponse {
            balances: state
                .balances
                .iter()
                .map(|(token, amount)| (token.clone(), amount.to_string()))
                .collect(),
            available_coins: state.available_coins.len().to_string(),
            pending_coins: state.pending_coins.len().to_string(),
            total_coins: state.total_coins().to_string(),
            synced: true,
            address: state.address,
        })
    }

    async fn query_transaction(&self, request: QueryTransactionRequest) -> Result<Value, Failure> {
        let hash = request.hash.trim_start_matches("0x").to_lowercase();
        let response = match self.indexer.transaction(&hash).await? {
            Some(tx) => QueryTransactionResponse {
                found: true,
                succeeded: Some(tx.apply_stage == zkaudit_wallet::indexer::APPLY_STAGE_SUCCESS),
                hash: tx.hash,
                apply_stage: Some(tx.apply_stage),
                block: Some(BlockResponse {
                    height: tx.block.height,
                    hash: tx.block.hash,
                    timestamp: tx.block.timestamp,
                }),
            },
            None => QueryTransactionResponse {
                found: false,
                hash,
                apply_stage: None,
                succeeded: None,
                block: None,
            },
        };
        success(&response)
    }
}

async fn close_quietly(session: ContractSession) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close session wallet");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_round_trip_names() {
        for op in [
            Operation::Init,
            Operation::SubmitAudit,
            Operation::QueryAudit,
            Operation::GetLedger,
            Operation::NetworkHealth,
            Operation::WalletBalance,
            Operation::WalletAddress,
            Operation::QueryTransaction,
        ] {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        let err = "launch".parse::<Operation>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: launch");
    }

    #[test]
    fn submit_request_accepts_numbers_or_strings() {
        let numeric: SubmitAuditRequest = serde_json::from_value(serde_json::json!({
            "audit_id": "0x".to_string() + &"01".repeat(32),
            "auditor_addr": "02".repeat(32),
            "threshold": 90,
            "witness": { "exploit_string": "dead", "risk_score": 95 }
        }))
        .unwrap();
        assert_eq!(numeric.threshold, 90);

        let stringy: SubmitAuditRequest = serde_json::from_value(serde_json::json!({
            "audit_id": "01".repeat(32),
            "auditor_id": "02".repeat(32),
            "threshold": "18446744073709551615",
            "witness": { "exploit_string": "dead", "risk_score": "95" }
        }))
        .unwrap();
        assert_eq!(stringy.threshold, u64::MAX);

        let submission = stringy.into_submission().unwrap();
        assert_eq!(submission.private_state.risk_score, 95);
        assert_eq!(&submission.private_state.exploit_string[..3], &[0xde, 0xad, 0x00]);
    }

    #[test]
    fn submit_request_rejects_bad_hex() {
        let request: SubmitAuditRequest = serde_json::from_value(serde_json::json!({
            "audit_id": "zz",
            "auditor_addr": "02".repeat(32),
            "threshold": 1,
            "witness": { "exploit_string": "", "risk_score": 1 }
        }))
        .unwrap();
        let err = request.into_submission().err().unwrap();
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("audit_id"));
    }

    #[test]
    fn health_request_blocks_is_optional() {
        let empty: NetworkHealthRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty.blocks, None);
        let set: NetworkHealthRequest = serde_json::from_value(serde_json::json!({ "blocks": "3" })).unwrap();
        assert_eq!(set.blocks, Some(3));
    }

    #[test]
    fn failure_envelope_carries_kind_and_context() {
        let f = Failure::from(BridgeError::StateNotFound(crate::record::NO_SESSION.into()))
            .with("found", Value::Bool(false));
        let value = failure(f);
        assert_eq!(value["success"], false);
        assert_eq!(value["error_kind"], "StateNotFoundError");
        assert_eq!(value["error"], "No contract initialized. Call init first.");
        assert_eq!(value["found"], false);
    }
}
