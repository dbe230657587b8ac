use std::fmt;

use crate::{
    Result, RoutingError, StageId, StageMetadataRef, VirtualServerAddress, WorkerMetadata,
};

/// Lifecycle of a stage plan on its way to, and inside, a worker.
///
/// Transitions only move forward. The first three belong to
/// [`StagePlanBuilder`], `Ready` to [`DistributedStagePlan`], and the last two
/// to the dispatch and execution paths that take ownership of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StagePlanState {
    Unpopulated,
    Assembling,
    Ready,
    Dispatched,
    Retired,
}

impl fmt::Display for StagePlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StagePlanState::Unpopulated => "unpopulated",
            StagePlanState::Assembling => "assembling",
            StagePlanState::Ready => "ready",
            StagePlanState::Dispatched => "dispatched",
            StagePlanState::Retired => "retired",
        };
        f.write_str(name)
    }
}

/// The plan fragment delivered to one worker: which stage, which worker of
/// that stage, the operator tree to run, and the stage's shared worker table.
///
/// `N` is the operator tree. This crate never looks inside it.
///
/// A value of this type is always complete and never changes; assembly goes
/// through [`StagePlanBuilder`].
#[derive(Debug, Clone)]
pub struct DistributedStagePlan<N> {
    stage_id: StageId,
    server: VirtualServerAddress,
    stage_root: N,
    stage_metadata: StageMetadataRef,
}

impl<N> DistributedStagePlan<N> {
    pub fn new(
        stage_id: StageId,
        server: VirtualServerAddress,
        stage_root: N,
        stage_metadata: StageMetadataRef,
    ) -> Self {
        Self {
            stage_id,
            server,
            stage_root,
            stage_metadata,
        }
    }

    /// Starts an empty plan for `stage_id` that is filled in field by field.
    pub fn builder(stage_id: StageId) -> StagePlanBuilder<N> {
        StagePlanBuilder {
            stage_id,
            server: None,
            stage_root: None,
            stage_metadata: None,
        }
    }

    pub fn stage_id(&self) -> StageId {
        self.stage_id
    }

    pub fn server(&self) -> &VirtualServerAddress {
        &self.server
    }

    pub fn stage_root(&self) -> &N {
        &self.stage_root
    }

    pub fn stage_metadata(&self) -> &StageMetadataRef {
        &self.stage_metadata
    }

    pub fn state(&self) -> StagePlanState {
        StagePlanState::Ready
    }

    /// Metadata of the worker this plan was built for.
    ///
    /// Looks up `server.worker_id` in the stage's worker table and checks the
    /// entry found there is exactly `server`.
    pub fn current_worker_metadata(&self) -> Result<&WorkerMetadata> {
        resolve(self.stage_id, &self.server, &self.stage_metadata)
    }

    pub fn into_parts(self) -> (StageId, VirtualServerAddress, N, StageMetadataRef) {
        (self.stage_id, self.server, self.stage_root, self.stage_metadata)
    }
}

fn resolve<'a>(
    stage_id: StageId,
    server: &VirtualServerAddress,
    stage_metadata: &'a StageMetadataRef,
) -> Result<&'a WorkerMetadata> {
    let worker = stage_metadata.worker_metadata_at(server.worker_id())?;
    if worker.server() != server {
        return Err(RoutingError::ServerMismatch {
            stage_id,
            expected: server.clone(),
            found: worker.server().clone(),
        });
    }
    Ok(worker)
}

/// Incremental assembly of a [`DistributedStagePlan`].
///
/// The stage id is fixed when the builder is created. [`build`](Self::build)
/// only succeeds once every field is set and the server resolves against the
/// stage metadata.
#[derive(Debug, Clone)]
pub struct StagePlanBuilder<N> {
    stage_id: StageId,
    server: Option<VirtualServerAddress>,
    stage_root: Option<N>,
    stage_metadata: Option<StageMetadataRef>,
}

impl<N> StagePlanBuilder<N> {
    pub fn stage_id(&self) -> StageId {
        self.stage_id
    }

    pub fn server(mut self, server: VirtualServerAddress) -> Self {
        self.server = Some(server);
        self
    }

    pub fn stage_root(mut self, stage_root: N) -> Self {
        self.stage_root = Some(stage_root);
        self
    }

    pub fn stage_metadata(mut self, stage_metadata: StageMetadataRef) -> Self {
        self.stage_metadata = Some(stage_metadata);
        self
    }

    pub fn state(&self) -> StagePlanState {
        match (
            self.server.is_some(),
            self.stage_root.is_some(),
            self.stage_metadata.is_some(),
        ) {
            (false, false, false) => StagePlanState::Unpopulated,
            (true, true, true) => StagePlanState::Ready,
            _ => StagePlanState::Assembling,
        }
    }

    /// Resolves the current worker's metadata from whatever has been set so far.
    pub fn current_worker_metadata(&self) -> Result<&WorkerMetadata> {
        let server = self.server.as_ref().ok_or(RoutingError::UnresolvedWorker {
            stage_id: self.stage_id,
        })?;
        let stage_metadata =
            self.stage_metadata
                .as_ref()
                .ok_or(RoutingError::MissingStageMetadata {
                    stage_id: self.stage_id,
                })?;
        resolve(self.stage_id, server, stage_metadata)
    }

    pub fn build(self) -> Result<DistributedStagePlan<N>> {
        let stage_id = self.stage_id;
        let missing = |field| RoutingError::IncompletePlan { stage_id, missing: field };

        let server = self.server.ok_or_else(|| missing("server"))?;
        let stage_root = self.stage_root.ok_or_else(|| missing("stage root"))?;
        let stage_metadata = self.stage_metadata.ok_or_else(|| missing("stage metadata"))?;

        resolve(stage_id, &server, &stage_metadata)?;
        tracing::trace!(stage_id, server = %server, "stage plan ready");

        Ok(DistributedStagePlan::new(
            stage_id,
            server,
            stage_root,
            stage_metadata,
        ))
    }
}
