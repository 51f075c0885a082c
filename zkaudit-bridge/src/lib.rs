//! zkaudit-bridge
//!
//! Contract sessions over the audit ledger and the JSON command protocol
//! used by external orchestrators.
//!
//! A command runs against the session record written by `init`:
//!
//! ```text
//! zkaudit-bridge init '{"mode":"deploy"}'
//! zkaudit-bridge submit_audit '{"audit_id":"..","auditor_addr":"..","threshold":90,
//!                              "witness":{"exploit_string":"..","risk_score":95}}'
//! zkaudit-bridge query_audit '{"audit_id":".."}'
//! zkaudit-bridge get_ledger
//! ```

pub mod config;
pub mod contract;
pub mod error;
pub mod health;
pub mod private_state;
pub mod protocol;
pub mod record;
pub mod session;

pub use config::BridgeConfig;
pub use contract::{IndexerDataProvider, PublicDataProvider};
pub use error::BridgeError;
pub use health::{network_health, HealthReport};
pub use private_state::{OpenRetry, PrivateStateStore, SledPrivateStateStore};
pub use protocol::{error_response, Bridge, CredentialSource, EnvCredentials, Operation};
pub use record::{RecordStore, SessionRecord};
pub use session::{AuditRecord, AuditSubmission, ContractSession, SessionContext, SubmitOutcome};
