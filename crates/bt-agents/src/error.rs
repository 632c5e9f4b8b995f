use bt_core::state_machine::TransitionError;
use bt_core::store::StoreError;
use bt_core::types::Specialization;
use uuid::Uuid;

use crate::governor::AdmissionRejected;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("bot not found: {0}")]
    BotNotFound(Uuid),

    #[error("chain not found: {0}")]
    ChainNotFound(Uuid),

    #[error("admission rejected: {0}")]
    AdmissionRejected(#[from] AdmissionRejected),

    #[error("remote execution failed for bot {bot_id}: {message}")]
    RemoteExecutionFailed { bot_id: Uuid, message: String },

    #[error("chain {chain_id} aborted: {reason}")]
    ChainAborted { chain_id: Uuid, reason: String },

    #[error("delegation failed: {0}")]
    DelegationFailed(String),

    #[error("a {0} bot already exists")]
    DuplicateSpecialization(Specialization),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("state machine error: {0}")]
    Transition(#[from] TransitionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
