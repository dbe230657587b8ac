// Query stages as produced by the plan compiler, before any worker is chosen.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use skein_routing::StageId;

use crate::error::{CoordinatorError, Result};

/// One stage of a compiled query: its operator tree and the stages it reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStage<N> {
    pub stage_id: StageId,
    pub root: N,
    #[serde(default)]
    pub input_stage_ids: Vec<StageId>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl<N> QueryStage<N> {
    pub fn new(stage_id: StageId, root: N) -> Self {
        Self {
            stage_id,
            root,
            input_stage_ids: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_inputs(mut self, input_stage_ids: impl IntoIterator<Item = StageId>) -> Self {
        self.input_stage_ids.extend(input_stage_ids);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A compiled query split into stages.
///
/// Stages form a tree: the root stage returns results to the broker and every
/// other stage feeds exactly one consumer.
#[derive(Debug, Clone)]
pub struct MultiStagePlan<N> {
    root_stage_id: StageId,
    stages: BTreeMap<StageId, QueryStage<N>>,
    consumers: BTreeMap<StageId, StageId>,
}

impl<N> MultiStagePlan<N> {
    pub fn try_new(root_stage_id: StageId, stages: Vec<QueryStage<N>>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for stage in stages {
            let stage_id = stage.stage_id;
            if by_id.insert(stage_id, stage).is_some() {
                return Err(CoordinatorError::InvalidPlan(format!("duplicate stage {stage_id}")));
            }
        }
        if !by_id.contains_key(&root_stage_id) {
            return Err(CoordinatorError::InvalidPlan(format!(
                "root stage {root_stage_id} is not part of the plan"
            )));
        }

        let mut consumers = BTreeMap::new();
        for stage in by_id.values() {
            for &input in &stage.input_stage_ids {
                if !by_id.contains_key(&input) {
                    return Err(CoordinatorError::InvalidPlan(format!(
                        "stage {} reads from unknown stage {input}",
                        stage.stage_id
                    )));
                }
                if input == root_stage_id {
                    return Err(CoordinatorError::InvalidPlan(format!(
                        "root stage {root_stage_id} cannot feed stage {}",
                        stage.stage_id
                    )));
                }
                if let Some(previous) = consumers.insert(input, stage.stage_id) {
                    return Err(CoordinatorError::InvalidPlan(format!(
                        "stage {input} feeds both stage {previous} and stage {}",
                        stage.stage_id
                    )));
                }
            }
        }

        let plan = Self {
            root_stage_id,
            stages: by_id,
            consumers,
        };
        plan.check_reachable()?;
        Ok(plan)
    }

    // Every stage must hang off the root, otherwise it is part of a cycle or orphaned.
    fn check_reachable(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![self.root_stage_id];
        while let Some(stage_id) = pending.pop() {
            if seen.insert(stage_id) {
                pending.extend(&self.stages[&stage_id].input_stage_ids);
            }
        }
        if let Some(orphan) = self.stages.keys().find(|id| !seen.contains(*id)) {
            return Err(CoordinatorError::InvalidPlan(format!(
                "stage {orphan} is not reachable from root stage {}",
                self.root_stage_id
            )));
        }
        Ok(())
    }

    pub fn root_stage_id(&self) -> StageId {
        self.root_stage_id
    }

    pub fn stage(&self, stage_id: StageId) -> Option<&QueryStage<N>> {
        self.stages.get(&stage_id)
    }

    pub fn stages(&self) -> impl Iterator<Item = &QueryStage<N>> + '_ {
        self.stages.values()
    }

    pub fn stage_ids(&self) -> impl Iterator<Item = StageId> + '_ {
        self.stages.keys().copied()
    }

    /// The stage consuming `stage_id`'s output; `None` for the root stage.
    pub fn consumer_of(&self, stage_id: StageId) -> Option<StageId> {
        self.consumers.get(&stage_id).copied()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
