use skein_api::WireError;
use skein_routing::{RoutingError, StageId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] skein_common::Error),

    #[error("Invalid server instance {0:?}, expected host:port")]
    InvalidServer(String),

    #[error("Invalid multi-stage plan: {0}")]
    InvalidPlan(String),

    #[error("No workers available to assign stages to")]
    NoWorkers,

    #[error("Stage {0} has no workers assigned")]
    MissingAssignment(StageId),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Failed to assemble stage plans")]
    Routing(#[from] RoutingError),

    #[error("Failed to encode stage plan")]
    Wire(#[from] WireError),

    #[error("Failed to deliver stage plan to {server}: {reason}")]
    Transport { server: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
