use thiserror::Error;

use crate::{StageId, VirtualServerAddress, WorkerId};

/// Structural inconsistencies in stage addressing.
///
/// None of these are retryable: the same plan always reproduces the same
/// failure, so they are reported to whoever coordinates the query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Worker index {worker_id} out of range for a stage with {num_workers} workers")]
    WorkerIndexOutOfRange { worker_id: WorkerId, num_workers: usize },

    #[error("Worker metadata at index {index} carries worker id {found}")]
    WorkerIdMismatch { index: usize, found: WorkerId },

    #[error("Stage declares {expected} workers but {actual} were provided")]
    WorkerCountMismatch { expected: usize, actual: usize },

    #[error("A stage must have at least one worker")]
    EmptyStage,

    #[error("Stage {stage_id} has no server to resolve worker metadata for")]
    UnresolvedWorker { stage_id: StageId },

    #[error("Stage {stage_id} has no stage metadata")]
    MissingStageMetadata { stage_id: StageId },

    #[error("Stage plan {stage_id} is incomplete: missing {missing}")]
    IncompletePlan { stage_id: StageId, missing: &'static str },

    #[error("Stage {stage_id}: server {expected} resolves to metadata for {found}")]
    ServerMismatch {
        stage_id: StageId,
        expected: VirtualServerAddress,
        found: VirtualServerAddress,
    },

    #[error("Stage {stage_id} references unknown stage {related_stage}")]
    UnknownStage { stage_id: StageId, related_stage: StageId },

    #[error("Stage {stage_id} worker {worker_id} references {peer} which is not a worker of stage {related_stage}")]
    DanglingPeer {
        stage_id: StageId,
        worker_id: WorkerId,
        related_stage: StageId,
        peer: VirtualServerAddress,
    },

    #[error("Invalid virtual server address: {0}")]
    InvalidAddress(String),

    #[error("Invalid value {value:?} for stage property {key}")]
    InvalidProperty { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, RoutingError>;
