use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::{Result, RoutingError, VirtualServerAddress, WorkerId, WorkerMetadata};

/// Stage property holding the stage execution timeout in milliseconds.
pub const TIMEOUT_MS_KEY: &str = "timeoutMs";

/// Shared handle to a stage's worker table. Every plan of a stage holds the same one.
pub type StageMetadataRef = Arc<PlanFragmentMetadata>;

/// The worker table of one stage plus the properties shared by all of its workers.
///
/// Position `i` of the table always holds the metadata of worker `i`; this is
/// checked when the table is built, so lookups can rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanFragmentMetadata {
    workers: Vec<WorkerMetadata>,
    properties: BTreeMap<String, String>,
}

impl PlanFragmentMetadata {
    /// Validates and wraps a worker table.
    pub fn try_new(
        workers: Vec<WorkerMetadata>,
        properties: BTreeMap<String, String>,
    ) -> Result<Self> {
        if workers.is_empty() {
            return Err(RoutingError::EmptyStage);
        }
        for (index, worker) in workers.iter().enumerate() {
            let found = worker.server().worker_id();
            if found != index {
                return Err(RoutingError::WorkerIdMismatch { index, found });
            }
        }
        Ok(Self {
            workers,
            properties,
        })
    }

    /// Builder for a stage declaring `num_workers` workers.
    pub fn builder(num_workers: usize) -> PlanFragmentMetadataBuilder {
        PlanFragmentMetadataBuilder {
            num_workers,
            workers: Vec::with_capacity(num_workers),
            properties: BTreeMap::new(),
        }
    }

    pub fn worker_metadata_at(&self, worker_id: WorkerId) -> Result<&WorkerMetadata> {
        self.workers
            .get(worker_id)
            .ok_or(RoutingError::WorkerIndexOutOfRange {
                worker_id,
                num_workers: self.workers.len(),
            })
    }

    pub fn workers(&self) -> &[WorkerMetadata] {
        &self.workers
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn servers(&self) -> impl Iterator<Item = &VirtualServerAddress> + '_ {
        self.workers.iter().map(WorkerMetadata::server)
    }

    /// Whether `server` is exactly the address of one of this stage's workers.
    pub fn contains_server(&self, server: &VirtualServerAddress) -> bool {
        self.workers
            .get(server.worker_id())
            .is_some_and(|worker| worker.server() == server)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// The stage timeout from [`TIMEOUT_MS_KEY`], if set.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        let Some(value) = self.property(TIMEOUT_MS_KEY) else {
            return Ok(None);
        };
        value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| RoutingError::InvalidProperty {
                key: TIMEOUT_MS_KEY.to_string(),
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct PlanFragmentMetadataBuilder {
    num_workers: usize,
    workers: Vec<WorkerMetadata>,
    properties: BTreeMap<String, String>,
}

impl PlanFragmentMetadataBuilder {
    pub fn worker(mut self, worker: WorkerMetadata) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn build(self) -> Result<PlanFragmentMetadata> {
        if self.workers.len() != self.num_workers {
            return Err(RoutingError::WorkerCountMismatch {
                expected: self.num_workers,
                actual: self.workers.len(),
            });
        }
        PlanFragmentMetadata::try_new(self.workers, self.properties)
    }
}
