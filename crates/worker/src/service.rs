//! Receiving side of stage dispatch.
//!
//! A [`StageWorker`] takes encoded plans off the wire, rebuilds them, resolves
//! the metadata of the worker each plan targets and hands the result to the
//! engine through [`StageExecutor`].

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use skein_api::{decode_stage_plan, StageEnvelope};
use skein_routing::{
    DistributedStagePlan, StageId, StagePlanState, VirtualServerAddress, WorkerId, WorkerMetadata,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{Result, WorkerError};

/// Peer addresses of one worker, per related stage, in worker-id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeRoutes {
    routes: BTreeMap<StageId, Vec<VirtualServerAddress>>,
}

impl ExchangeRoutes {
    pub fn from_worker_metadata(metadata: &WorkerMetadata) -> Self {
        Self {
            routes: metadata.mailboxes().clone(),
        }
    }

    /// Empty when this worker does not exchange data with `stage_id`.
    pub fn peers(&self, stage_id: StageId) -> &[VirtualServerAddress] {
        self.routes.get(&stage_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The `index`-th peer in `stage_id`, as the exchange operator addresses it.
    pub fn peer(&self, stage_id: StageId, index: usize) -> Option<&VirtualServerAddress> {
        self.peers(stage_id).get(index)
    }

    pub fn related_stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.routes.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A decoded plan whose worker metadata has been resolved.
#[derive(Debug)]
pub struct DispatchedStage<N> {
    query_id: Uuid,
    plan: DistributedStagePlan<N>,
    routes: ExchangeRoutes,
}

impl<N> DispatchedStage<N> {
    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn stage_id(&self) -> StageId {
        self.plan.stage_id()
    }

    pub fn worker_id(&self) -> WorkerId {
        self.plan.server().worker_id()
    }

    pub fn plan(&self) -> &DistributedStagePlan<N> {
        &self.plan
    }

    pub fn routes(&self) -> &ExchangeRoutes {
        &self.routes
    }

    pub fn state(&self) -> StagePlanState {
        StagePlanState::Dispatched
    }
}

/// The execution engine, as seen from the worker.
#[async_trait]
pub trait StageExecutor<N: Send + Sync + 'static>: Send + Sync {
    async fn execute(&self, stage: Arc<DispatchedStage<N>>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// The executor ran the stage and reported an error.
    Failed(String),
    /// The plan never reached the executor.
    Rejected(String),
}

/// What the coordinator hears back about one stage on one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub query_id: Uuid,
    pub stage_id: StageId,
    pub worker_id: WorkerId,
    pub outcome: StageOutcome,
    pub finished_at: DateTime<Utc>,
}

impl StageReport {
    fn new(query_id: Uuid, stage_id: StageId, worker_id: WorkerId, outcome: StageOutcome) -> Self {
        Self {
            query_id,
            stage_id,
            worker_id,
            outcome,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == StageOutcome::Completed
    }

    /// A reported stage is done with, whatever the outcome.
    pub fn state(&self) -> StagePlanState {
        StagePlanState::Retired
    }
}

pub struct StageWorker<E> {
    instance_id: String,
    executor: Arc<E>,
}

impl<E> StageWorker<E> {
    pub fn new(instance_id: impl Into<String>, executor: E) -> Self {
        Self {
            instance_id: instance_id.into(),
            executor: Arc::new(executor),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Decodes `envelope` and resolves the metadata of the worker it targets.
    pub fn accept<N: DeserializeOwned>(&self, envelope: &StageEnvelope) -> Result<DispatchedStage<N>> {
        let plan: DistributedStagePlan<N> = decode_stage_plan(&envelope.payload)?;
        if plan.stage_id() != envelope.stage_id || plan.server() != &envelope.server {
            return Err(WorkerError::EnvelopeMismatch {
                envelope_stage: envelope.stage_id,
                envelope_server: envelope.server.to_string(),
                plan_stage: plan.stage_id(),
                plan_server: plan.server().to_string(),
            });
        }

        let routes = ExchangeRoutes::from_worker_metadata(plan.current_worker_metadata()?);
        tracing::debug!(
            instance = %self.instance_id,
            query_id = %envelope.query_id,
            stage_id = plan.stage_id(),
            server = %plan.server(),
            relations = routes.routes.len(),
            "accepted stage plan"
        );
        Ok(DispatchedStage {
            query_id: envelope.query_id,
            plan,
            routes,
        })
    }
}

impl<E> StageWorker<E> {
    /// Runs one stage to completion and reports how it went.
    ///
    /// Rejections and executor failures end up in the report, not in an `Err`.
    pub async fn submit<N>(&self, envelope: StageEnvelope) -> StageReport
    where
        N: DeserializeOwned + Send + Sync + 'static,
        E: StageExecutor<N>,
    {
        let stage_id = envelope.stage_id;
        let worker_id = envelope.server.worker_id();

        let stage = match self.accept::<N>(&envelope) {
            Ok(stage) => Arc::new(stage),
            Err(e) => {
                tracing::warn!(
                    instance = %self.instance_id,
                    query_id = %envelope.query_id,
                    stage_id,
                    error = %e,
                    "rejected stage plan"
                );
                return StageReport::new(envelope.query_id, stage_id, worker_id, StageOutcome::Rejected(e.to_string()));
            }
        };

        let timeout = match stage.plan().stage_metadata().timeout() {
            Ok(timeout) => timeout,
            Err(e) => {
                return StageReport::new(
                    envelope.query_id,
                    stage_id,
                    worker_id,
                    StageOutcome::Rejected(WorkerError::from(e).to_string()),
                )
            }
        };

        let outcome = match self.run(stage, timeout).await {
            Ok(()) => StageOutcome::Completed,
            Err(e) => StageOutcome::Failed(e.to_string()),
        };
        tracing::info!(
            instance = %self.instance_id,
            query_id = %envelope.query_id,
            stage_id,
            worker_id,
            outcome = ?outcome,
            "retired stage"
        );
        StageReport::new(envelope.query_id, stage_id, worker_id, outcome)
    }

    async fn run<N>(&self, stage: Arc<DispatchedStage<N>>, timeout: Option<Duration>) -> Result<()>
    where
        N: Send + Sync + 'static,
        E: StageExecutor<N>,
    {
        let stage_id = stage.stage_id();
        let execution = AssertUnwindSafe(self.executor.execute(stage)).catch_unwind();
        let finished = match timeout {
            Some(limit) => tokio::time::timeout(limit, execution)
                .await
                .map_err(|_| WorkerError::Timeout {
                    stage_id,
                    timeout_ms: limit.as_millis(),
                })?,
            None => execution.await,
        };
        finished.unwrap_or_else(|_| {
            Err(WorkerError::Execution {
                stage_id,
                reason: "executor panicked".to_string(),
            })
        })
    }

    /// Executes every plan arriving on `plans` concurrently, sending one report
    /// per plan to `reports`. Finished tasks are reaped as they complete.
    /// Returns once `plans` is closed and every running stage is done.
    pub async fn serve<N>(
        self: Arc<Self>,
        mut plans: mpsc::Receiver<StageEnvelope>,
        reports: mpsc::Sender<StageReport>,
    ) where
        N: DeserializeOwned + Send + Sync + 'static,
        E: StageExecutor<N> + 'static,
    {
        let mut running = JoinSet::new();
        let mut intake_open = true;
        loop {
            tokio::select! {
                received = plans.recv(), if intake_open => match received {
                    Some(envelope) => {
                        let worker = Arc::clone(&self);
                        let reports = reports.clone();
                        running.spawn(async move {
                            let report = worker.submit::<N>(envelope).await;
                            if reports.send(report).await.is_err() {
                                tracing::warn!(instance = %worker.instance_id, "stage report dropped, no listener");
                            }
                        });
                    }
                    None => intake_open = false,
                },
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(instance = %self.instance_id, error = %e, "stage task aborted");
                    }
                }
                else => break,
            }
        }
        tracing::info!(instance = %self.instance_id, "stage intake closed");
    }
}
