//! Worker side of the Skein stage runtime: plan intake and the admin API.
//!
//! Moving plans over the network is left to the host process. It embeds a
//! [`StageWorker`], feeds [`StageWorker::serve`] from its transport on
//! `worker_host:worker_port`, and forwards the resulting [`StageReport`]s.
//! [`run_worker`] covers the part every worker process shares: the admin API.

use std::future::Future;

pub mod admin;
pub mod config;
pub mod error;
pub mod service;

pub use admin::{router, AdminApiApplication, InstanceInfo};
pub use config::{ListenerConfig, Settings};
pub use error::{Result, WorkerError};
pub use service::{
    DispatchedStage, ExchangeRoutes, StageExecutor, StageOutcome, StageReport, StageWorker,
};

/// Runs the admin API of a worker until `shutdown` resolves.
pub async fn run_worker(settings: Settings, shutdown: impl Future<Output = ()>) -> Result<()> {
    let worker_addr = settings.worker_server_address();
    let mut admin = AdminApiApplication::new(settings.instance_id.clone());
    admin.start(&settings.admin_listeners).await?;
    tracing::info!(
        instance = %settings.instance_id,
        %worker_addr,
        "worker started"
    );

    shutdown.await;
    admin.stop().await;
    tracing::info!(instance = %settings.instance_id, "worker stopped");
    Ok(())
}
