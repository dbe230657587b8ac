//! Choosing which physical servers run each stage.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skein_routing::{StageId, VirtualServerAddress, WorkerId};

use crate::error::{CoordinatorError, Result};
use crate::stage::MultiStagePlan;

/// A physical worker process, `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerInstance {
    host: String,
    port: u16,
}

impl ServerInstance {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address of this server when it runs worker `worker_id` of some stage.
    pub fn virtual_address(&self, worker_id: WorkerId) -> VirtualServerAddress {
        VirtualServerAddress::new(self.host.clone(), self.port, worker_id)
    }
}

impl fmt::Display for ServerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerInstance {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| CoordinatorError::InvalidServer(s.to_string()))?;
        if host.is_empty() {
            return Err(CoordinatorError::InvalidServer(s.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| CoordinatorError::InvalidServer(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

/// The ordered servers of every stage. Position in a stage's list becomes the
/// worker id of that server within the stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerAssignment {
    stages: BTreeMap<StageId, Vec<ServerInstance>>,
}

impl WorkerAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(mut self, stage_id: StageId, servers: Vec<ServerInstance>) -> Self {
        self.stages.insert(stage_id, servers);
        self
    }

    /// Spreads stages over `pool` in round-robin order.
    ///
    /// The root stage gets a single worker; every other stage gets
    /// `parallelism` workers, capped at the pool size.
    pub fn round_robin<N>(
        plan: &MultiStagePlan<N>,
        pool: &[ServerInstance],
        parallelism: usize,
    ) -> Result<Self> {
        if pool.is_empty() {
            return Err(CoordinatorError::NoWorkers);
        }
        let parallelism = parallelism.clamp(1, pool.len());

        let mut next = 0;
        let mut assignment = Self::new();
        for stage_id in plan.stage_ids() {
            let count = if stage_id == plan.root_stage_id() { 1 } else { parallelism };
            let servers = (0..count)
                .map(|i| pool[(next + i) % pool.len()].clone())
                .collect();
            next = (next + count) % pool.len();
            assignment = assignment.assign(stage_id, servers);
        }
        Ok(assignment)
    }

    pub fn servers_for(&self, stage_id: StageId) -> Result<&[ServerInstance]> {
        match self.stages.get(&stage_id) {
            Some(servers) if !servers.is_empty() => Ok(servers),
            _ => Err(CoordinatorError::MissingAssignment(stage_id)),
        }
    }

    /// Virtual addresses of a stage's workers, in worker-id order.
    pub fn virtual_addresses(&self, stage_id: StageId) -> Result<Vec<VirtualServerAddress>> {
        Ok(self
            .servers_for(stage_id)?
            .iter()
            .enumerate()
            .map(|(worker_id, server)| server.virtual_address(worker_id))
            .collect())
    }
}
