use std::collections::BTreeMap;

use crate::{Result, RoutingError, StageId, StageMetadataRef};

/// The worker tables of every stage of one query.
///
/// Used at assembly time to check that every peer a worker points at is a real
/// worker of the stage it claims to belong to.
#[derive(Debug, Clone, Default)]
pub struct StageTopology {
    stages: BTreeMap<StageId, StageMetadataRef>,
}

impl StageTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stage_id: StageId, metadata: StageMetadataRef) -> Option<StageMetadataRef> {
        self.stages.insert(stage_id, metadata)
    }

    pub fn get(&self, stage_id: StageId) -> Option<&StageMetadataRef> {
        self.stages.get(&stage_id)
    }

    pub fn stage_ids(&self) -> impl Iterator<Item = StageId> + '_ {
        self.stages.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Checks every peer reference of every worker against the referenced
    /// stage's own worker table.
    pub fn validate(&self) -> Result<()> {
        for (&stage_id, metadata) in &self.stages {
            for worker in metadata.workers() {
                for (&related_stage, peers) in worker.mailboxes() {
                    let related = self.stages.get(&related_stage).ok_or(
                        RoutingError::UnknownStage {
                            stage_id,
                            related_stage,
                        },
                    )?;
                    if let Some(peer) = peers.iter().find(|peer| !related.contains_server(peer)) {
                        return Err(RoutingError::DanglingPeer {
                            stage_id,
                            worker_id: worker.server().worker_id(),
                            related_stage,
                            peer: peer.clone(),
                        });
                    }
                }
            }
        }
        tracing::debug!(stages = self.stages.len(), "stage topology validated");
        Ok(())
    }
}
