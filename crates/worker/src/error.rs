use thiserror::Error;

use skein_routing::{RoutingError, StageId};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] skein_common::Error),

    #[error("Listener {listener} uses unsupported protocol {protocol}")]
    UnsupportedProtocol { listener: String, protocol: String },

    #[error("Failed to bind admin listener {listener}: {source}")]
    Bind {
        listener: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rejected stage plan: {0}")]
    Wire(#[from] skein_api::WireError),

    #[error("Envelope for stage {envelope_stage} at {envelope_server} carries plan for stage {plan_stage} at {plan_server}")]
    EnvelopeMismatch {
        envelope_stage: StageId,
        envelope_server: String,
        plan_stage: StageId,
        plan_server: String,
    },

    #[error("Stage plan does not resolve: {0}")]
    Routing(#[from] RoutingError),

    #[error("Stage {stage_id} failed: {reason}")]
    Execution { stage_id: StageId, reason: String },

    #[error("Stage {stage_id} timed out after {timeout_ms} ms")]
    Timeout { stage_id: StageId, timeout_ms: u128 },
}

pub type Result<T> = std::result::Result<T, WorkerError>;
