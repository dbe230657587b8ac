//! Routing crate
//!
//! The addressing and routing model that makes a stage plan deliverable to,
//! and resolvable by, one specific worker:
//!
//! * [`VirtualServerAddress`] identifies one worker inside one stage.
//! * [`WorkerMetadata`] lists, per related stage, the peers a worker exchanges data with.
//! * [`PlanFragmentMetadata`] is the shared, validated worker table of one stage.
//! * [`DistributedStagePlan`] is what a single worker receives.
//! * [`StageTopology`] cross-checks the worker tables of every stage of a query.
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use skein_routing::{DistributedStagePlan, PlanFragmentMetadata, VirtualServerAddress, WorkerMetadata};
//!
//! let workers = (0..2)
//!     .map(|id| WorkerMetadata::new(VirtualServerAddress::new("localhost", 9000 + id as u16, id)))
//!     .collect();
//! let metadata = Arc::new(PlanFragmentMetadata::try_new(workers, Default::default()).unwrap());
//! let plan = DistributedStagePlan::new(1, VirtualServerAddress::new("localhost", 9001, 1), "root", metadata);
//! assert_eq!(plan.current_worker_metadata().unwrap().server().worker_id(), 1);
//! ```

pub mod address;
pub mod error;
pub mod fragment_metadata;
pub mod stage_plan;
pub mod topology;
pub mod worker_metadata;

pub use address::VirtualServerAddress;
pub use error::{Result, RoutingError};
pub use fragment_metadata::{PlanFragmentMetadata, PlanFragmentMetadataBuilder, StageMetadataRef, TIMEOUT_MS_KEY};
pub use stage_plan::{DistributedStagePlan, StagePlanBuilder, StagePlanState};
pub use topology::StageTopology;
pub use worker_metadata::{WorkerMetadata, WorkerMetadataBuilder};

/// Identifier of a stage, unique within one query.
pub type StageId = u32;

/// Dense, zero-based index of a worker within one stage's worker set.
pub type WorkerId = usize;
