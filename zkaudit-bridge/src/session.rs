//! Contract sessions: deploy or join a ledger and drive `submitAudit` against it.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use zkaudit_ledger::{
    AuditId, AuditLedger, AuditorId, ContractAction, ContractAddress, LedgerState, PrivateState,
};
use zkaudit_wallet::{
    NetworkId, TransactionPipeline, TxReceipt, UnbalancedTransaction, WalletBuilder,
    WalletCredentials, WalletSeed, WalletState, WalletSyncOrchestrator,
};

use crate::config::BridgeConfig;
use crate::contract::{require_ledger, PublicDataProvider};
use crate::error::BridgeError;
use crate::private_state::PrivateStateStore;

/// Collaborators shared by every session of one bridge.
#[derive(Clone)]
pub struct SessionContext {
    pub config: BridgeConfig,
    pub public_data: Arc<dyn PublicDataProvider>,
    pub private_states: Arc<dyn PrivateStateStore>,
    pub wallet_builder: Arc<dyn WalletBuilder>,
}

impl SessionContext {
    /// Build a wallet from `credentials` and wait until it is usable.
    pub async fn sync_wallet(
        &self,
        credentials: &WalletCredentials,
    ) -> Result<(TransactionPipeline, WalletState), BridgeError> {
        let seed: WalletSeed = credentials.derive_seed()?;
        let orchestrator = WalletSyncOrchestrator::new(
            self.wallet_builder.clone(),
            self.config.endpoints.clone(),
            self.config.network_id,
        )
        .with_schedule(self.config.sync);
        let synced = orchestrator.build_and_sync(&seed).await?;
        Ok((
            TransactionPipeline::new(synced.wallet, self.config.network_id),
            synced.state,
        ))
    }
}

/// One `submitAudit` request with its private inputs.
pub struct AuditSubmission {
    pub audit_id: AuditId,
    pub auditor_id: AuditorId,
    pub threshold: u64,
    pub private_state: PrivateState,
}

/// Result of an included `submitAudit` call.
#[derive(Clone, Debug)]
pub struct SubmitOutcome {
    pub receipt: TxReceipt,
    pub ledger: LedgerState,
}

/// A ledger instance bound to a contract address.
pub struct ContractSession {
    ctx: SessionContext,
    address: ContractAddress,
    private_state: PrivateState,
    pipeline: Option<TransactionPipeline>,
}

impl std::fmt::Debug for ContractSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractSession")
            .field("address", &self.address)
            .field("network_id", &self.ctx.config.network_id)
            .field("has_wallet", &self.pipeline.is_some())
            .finish_non_exhaustive()
    }
}

impl ContractSession {
    /// Deploy a fresh ledger at a random-nonce address.
    ///
    /// Wallet and submission failures surface as `DeploymentError`; bad
    /// credentials stay `CredentialError`.
    #[instrument(skip_all, fields(network = %ctx.config.network_id))]
    pub async fn deploy(
        ctx: SessionContext,
        credentials: &WalletCredentials,
    ) -> Result<(Self, TxReceipt), BridgeError> {
        let (pipeline, _) = ctx
            .sync_wallet(credentials)
            .await
            .map_err(BridgeError::into_deployment)?;

        let nonce: [u8; 32] = rand::random();
        let action = ContractAction::deploy(&nonce)?;
        let address = action.address();
        info!(%address, "deploying audit ledger");

        let tx = UnbalancedTransaction::new(ctx.config.network_id, action.encode()?);
        let receipt = pipeline
            .balance_and_submit(tx, Vec::new())
            .await
            .map_err(|e| BridgeError::from(e).into_deployment())?;

        // An included transaction can still fail to apply.
        require_ledger(ctx.public_data.as_ref(), &address)
            .await
            .map_err(BridgeError::into_deployment)?;

        let private_state = PrivateState::default();
        ctx.private_states
            .set(&ctx.config.private_state_store, &address, &private_state)?;
        info!(%address, tx_id = %receipt.tx_id, block_height = receipt.block_height, "audit ledger deployed");

        Ok((
            Self {
                ctx,
                address,
                private_state,
                pipeline: Some(pipeline),
            },
            receipt,
        ))
    }

    /// Bind to an existing ledger. A wallet is built and the stored private
    /// state loaded only when `credentials` are given; a read-only session
    /// never touches the private-state store.
    #[instrument(skip_all, fields(%address, with_wallet = credentials.is_some()))]
    pub async fn join(
        ctx: SessionContext,
        address: ContractAddress,
        credentials: Option<&WalletCredentials>,
    ) -> Result<Self, BridgeError> {
        let private_state = match credentials {
            Some(_) => ctx
                .private_states
                .get(&ctx.config.private_state_store, &address)?
                .unwrap_or_default(),
            None => PrivateState::default(),
        };
        require_ledger(ctx.public_data.as_ref(), &address).await?;

        let pipeline = match credentials {
            Some(credentials) => Some(ctx.sync_wallet(credentials).await?.0),
            None => None,
        };

        Ok(Self {
            ctx,
            address,
            private_state,
            pipeline,
        })
    }

    pub fn address(&self) -> ContractAddress {
        self.address
    }

    pub fn network_id(&self) -> NetworkId {
        self.ctx.config.network_id
    }

    pub fn private_state(&self) -> &PrivateState {
        &self.private_state
    }

    /// Current public ledger.
    pub async fn ledger_state(&self) -> Result<LedgerState, BridgeError> {
        require_ledger(self.ctx.public_data.as_ref(), &self.address).await
    }

    /// `(found, proof_hash, is_verified)` for `audit_id`.
    pub async fn query_audit(&self, audit_id: &AuditId) -> Result<AuditRecord, BridgeError> {
        let ledger = self.ledger_state().await?;
        Ok(AuditRecord {
            found: ledger.is_verified(audit_id).is_some(),
            proof_hash: ledger.proof(audit_id).map(|p| p.to_hex()),
            is_verified: ledger.is_verified(audit_id).unwrap_or(false),
        })
    }

    /// Persist the private state, run the circuit locally and submit the call.
    ///
    /// The private state is stored before evaluation, so a failed assertion
    /// still replaces it.
    #[instrument(skip_all, fields(address = %self.address, audit_id = %submission.audit_id, threshold = submission.threshold))]
    pub async fn submit_audit(&mut self, submission: AuditSubmission) -> Result<SubmitOutcome, BridgeError> {
        let pipeline = self.pipeline.as_ref().ok_or_else(|| {
            BridgeError::Validation("session was joined without a wallet".into())
        })?;

        self.ctx.private_states.set(
            &self.ctx.config.private_state_store,
            &self.address,
            &submission.private_state,
        )?;
        self.private_state = submission.private_state;

        let ledger = require_ledger(self.ctx.public_data.as_ref(), &self.address).await?;
        let output = AuditLedger::from_state(ledger, self.private_state.clone())
            .with_policy(self.ctx.config.policy)
            .evaluate(submission.audit_id, submission.auditor_id, submission.threshold)
            .map_err(|e| {
                warn!(error = %e, "circuit rejected submission");
                BridgeError::from(e)
            })?;

        let action = ContractAction::submit_audit(self.address, output.transcript);
        let tx = UnbalancedTransaction::new(self.network_id(), action.encode()?);
        let receipt = pipeline.balance_and_submit(tx, Vec::new()).await?;

        let ledger = self.ledger_state().await?;
        Ok(SubmitOutcome { receipt, ledger })
    }

    /// Stop the session's wallet, if any.
    pub async fn close(self) -> Result<(), BridgeError> {
        if let Some(pipeline) = self.pipeline {
            pipeline.wallet().close().await?;
        }
        Ok(())
    }
}

/// Lookup result for one audit id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditRecord {
    pub found: bool,
    pub proof_hash: Option<String>,
    pub is_verified: bool,
}
