//! Sending assembled stage plans to their workers.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Serialize;
use skein_api::{encode_stage_plan, StageEnvelope};
use skein_routing::{StageId, StagePlanState, VirtualServerAddress};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::assembler::AssembledQuery;
use crate::error::{CoordinatorError, Result};

/// Delivers encoded stage plans to workers.
#[async_trait]
pub trait StageTransport: Send + Sync {
    async fn send(&self, envelope: StageEnvelope) -> Result<()>;
}

/// In-process transport: one channel per physical worker, keyed by `host:port`.
#[derive(Debug, Clone, Default)]
pub struct ChannelTransport {
    routes: HashMap<String, mpsc::Sender<StageEnvelope>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, physical_address: impl Into<String>, sender: mpsc::Sender<StageEnvelope>) {
        self.routes.insert(physical_address.into(), sender);
    }
}

#[async_trait]
impl StageTransport for ChannelTransport {
    async fn send(&self, envelope: StageEnvelope) -> Result<()> {
        let server = envelope.server.physical_address();
        let sender = self
            .routes
            .get(&server)
            .ok_or_else(|| CoordinatorError::WorkerNotFound(server.clone()))?;
        sender
            .send(envelope)
            .await
            .map_err(|e| CoordinatorError::Transport {
                server,
                reason: e.to_string(),
            })
    }
}

/// Where the plans of one query went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedQuery {
    query_id: Uuid,
    targets: Vec<(StageId, VirtualServerAddress)>,
}

impl DispatchedQuery {
    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn targets(&self) -> &[(StageId, VirtualServerAddress)] {
        &self.targets
    }

    pub fn state(&self) -> StagePlanState {
        StagePlanState::Dispatched
    }
}

pub struct QueryDispatcher<T> {
    transport: T,
}

impl<T: StageTransport> QueryDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatches every plan of `query` under a fresh query id.
    pub async fn dispatch<N: Serialize>(&self, query: AssembledQuery<N>) -> Result<DispatchedQuery> {
        self.dispatch_with_id(Uuid::new_v4(), query).await
    }

    /// Encodes all plans, then sends them concurrently.
    ///
    /// Nothing is sent if any plan fails to encode. The assembled plans are
    /// consumed either way.
    pub async fn dispatch_with_id<N: Serialize>(
        &self,
        query_id: Uuid,
        query: AssembledQuery<N>,
    ) -> Result<DispatchedQuery> {
        let envelopes = query
            .into_plans()
            .into_iter()
            .map(|plan| -> Result<StageEnvelope> {
                Ok(StageEnvelope {
                    query_id,
                    stage_id: plan.stage_id(),
                    server: plan.server().clone(),
                    payload: encode_stage_plan(&plan)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let targets: Vec<_> = envelopes
            .iter()
            .map(|envelope| (envelope.stage_id, envelope.server.clone()))
            .collect();

        let sends = envelopes
            .into_iter()
            .map(|envelope| self.transport.send(envelope));
        if let Err(e) = try_join_all(sends).await {
            tracing::error!(%query_id, error = %e, "failed to dispatch stage plans");
            return Err(e);
        }

        tracing::info!(%query_id, plans = targets.len(), "dispatched stage plans");
        Ok(DispatchedQuery { query_id, targets })
    }
}
