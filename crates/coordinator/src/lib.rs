pub mod assembler;
pub mod assignment;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod stage;

pub use assembler::{AssembledQuery, StagePlanAssembler};
pub use assignment::{ServerInstance, WorkerAssignment};
pub use dispatcher::{ChannelTransport, DispatchedQuery, QueryDispatcher, StageTransport};
pub use error::{CoordinatorError, Result};
pub use stage::{MultiStagePlan, QueryStage};
