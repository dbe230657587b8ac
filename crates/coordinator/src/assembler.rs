//! Turns a compiled multi-stage plan plus a worker assignment into one
//! `DistributedStagePlan` per (stage, worker).

use std::collections::BTreeMap;
use std::sync::Arc;

use skein_routing::{
    DistributedStagePlan, PlanFragmentMetadata, StageId, StageMetadataRef, StageTopology,
    VirtualServerAddress, WorkerMetadata,
};

use crate::assignment::WorkerAssignment;
use crate::error::Result;
use crate::stage::{MultiStagePlan, QueryStage};

/// Builds the per-worker stage plans of a query.
///
/// A worker of stage S is wired to every worker of each stage S reads from and
/// to every worker of the stage consuming S, in worker-id order.
#[derive(Debug, Clone, Default)]
pub struct StagePlanAssembler {
    stage_properties: BTreeMap<String, String>,
}

impl StagePlanAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A property applied to every stage unless the stage sets its own value.
    pub fn with_stage_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.stage_properties.insert(key.into(), value.into());
        self
    }

    pub fn assemble<N: Clone>(
        &self,
        plan: &MultiStagePlan<N>,
        assignment: &WorkerAssignment,
    ) -> Result<AssembledQuery<N>> {
        let mut addresses = BTreeMap::new();
        for stage_id in plan.stage_ids() {
            addresses.insert(stage_id, assignment.virtual_addresses(stage_id)?);
        }

        let mut topology = StageTopology::new();
        let mut stage_metadata = Vec::with_capacity(plan.len());
        for stage in plan.stages() {
            let metadata = Arc::new(self.fragment_metadata(plan, stage, &addresses)?);
            topology.insert(stage.stage_id, Arc::clone(&metadata));
            stage_metadata.push((stage, metadata));
        }
        topology.validate()?;

        let mut plans = Vec::new();
        for (stage, metadata) in stage_metadata {
            for server in &addresses[&stage.stage_id] {
                let stage_plan = DistributedStagePlan::builder(stage.stage_id)
                    .server(server.clone())
                    .stage_root(stage.root.clone())
                    .stage_metadata(Arc::clone(&metadata))
                    .build()?;
                plans.push(stage_plan);
            }
        }

        tracing::info!(
            stages = plan.len(),
            plans = plans.len(),
            root_stage = plan.root_stage_id(),
            "assembled distributed stage plans"
        );
        Ok(AssembledQuery { topology, plans })
    }

    fn fragment_metadata<N>(
        &self,
        plan: &MultiStagePlan<N>,
        stage: &QueryStage<N>,
        addresses: &BTreeMap<StageId, Vec<VirtualServerAddress>>,
    ) -> Result<PlanFragmentMetadata> {
        let consumer = plan.consumer_of(stage.stage_id);
        let related: Vec<StageId> = stage
            .input_stage_ids
            .iter()
            .copied()
            .chain(consumer)
            .collect();

        let servers = &addresses[&stage.stage_id];
        let mut builder = PlanFragmentMetadata::builder(servers.len())
            .properties(self.stage_properties.clone())
            .properties(stage.properties.clone());
        for server in servers {
            let mut worker = WorkerMetadata::builder(server.clone());
            for &related_stage in &related {
                worker = worker.peers(related_stage, addresses[&related_stage].iter().cloned());
            }
            builder = builder.worker(worker.build());
        }
        let metadata = builder.build()?;
        tracing::debug!(
            stage_id = stage.stage_id,
            workers = metadata.num_workers(),
            related = ?related,
            "built stage metadata"
        );
        Ok(metadata)
    }
}

/// Every stage plan of one query, not yet sent anywhere.
#[derive(Debug, Clone)]
pub struct AssembledQuery<N> {
    topology: StageTopology,
    plans: Vec<DistributedStagePlan<N>>,
}

impl<N> AssembledQuery<N> {
    pub fn topology(&self) -> &StageTopology {
        &self.topology
    }

    /// Plans ordered by stage id, then worker id.
    pub fn plans(&self) -> &[DistributedStagePlan<N>] {
        &self.plans
    }

    pub fn plans_for(&self, stage_id: StageId) -> impl Iterator<Item = &DistributedStagePlan<N>> + '_ {
        self.plans.iter().filter(move |plan| plan.stage_id() == stage_id)
    }

    pub fn stage_metadata(&self, stage_id: StageId) -> Option<&StageMetadataRef> {
        self.topology.get(stage_id)
    }

    pub fn into_plans(self) -> Vec<DistributedStagePlan<N>> {
        self.plans
    }
}
