use skein_common::{init_logging, LogFormat};
use skein_worker::{run_worker, Settings, WorkerError};

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    init_logging(LogFormat::Pretty);
    let settings = Settings::new()?;

    run_worker(settings, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await
}
