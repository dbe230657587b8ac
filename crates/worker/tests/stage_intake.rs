use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use skein_api::{encode_stage_plan, StageEnvelope};
use skein_routing::{
    DistributedStagePlan, PlanFragmentMetadata, StagePlanState, VirtualServerAddress, WorkerMetadata,
    TIMEOUT_MS_KEY,
};
use skein_worker::{DispatchedStage, StageExecutor, StageOutcome, StageWorker, WorkerError};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Fails any stage whose root is "boom", panics on "panic" and stalls on "stall".
#[derive(Default)]
struct ScriptedExecutor;

#[async_trait]
impl StageExecutor<String> for ScriptedExecutor {
    async fn execute(&self, stage: Arc<DispatchedStage<String>>) -> skein_worker::Result<()> {
        // Worker 1 is the only one wired to stage 7.
        assert_eq!(stage.routes().peers(7).len(), if stage.worker_id() == 1 { 2 } else { 0 });
        match stage.plan().stage_root().as_str() {
            "boom" => Err(WorkerError::Execution {
                stage_id: stage.stage_id(),
                reason: "operator failed".to_string(),
            }),
            "panic" => panic!("operator tree is corrupt"),
            "stall" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn addr(host: &str, port: u16, worker_id: usize) -> VirtualServerAddress {
    VirtualServerAddress::new(host, port, worker_id)
}

fn stage_table(timeout_ms: Option<&str>) -> Arc<PlanFragmentMetadata> {
    let mut builder = PlanFragmentMetadata::builder(3)
        .worker(WorkerMetadata::new(addr("w0", 9000, 0)))
        .worker(
            WorkerMetadata::builder(addr("w1", 9001, 1))
                .peers(7, [addr("A", 100, 0), addr("B", 101, 2)])
                .build(),
        )
        .worker(WorkerMetadata::new(addr("w2", 9002, 2)));
    if let Some(timeout) = timeout_ms {
        builder = builder.property(TIMEOUT_MS_KEY, timeout);
    }
    Arc::new(builder.build().unwrap())
}

fn envelope(root: &str, worker_id: usize, table: Arc<PlanFragmentMetadata>) -> StageEnvelope {
    let server = table.worker_metadata_at(worker_id).unwrap().server().clone();
    let plan = DistributedStagePlan::new(4, server.clone(), root.to_string(), table);
    StageEnvelope {
        query_id: Uuid::new_v4(),
        stage_id: 4,
        server,
        payload: encode_stage_plan(&plan).unwrap(),
    }
}

#[tokio::test]
async fn test_submit_resolves_routes_before_execution() {
    let worker = StageWorker::new("worker-1", ScriptedExecutor);
    let envelope = envelope("scan", 1, stage_table(None));
    let query_id = envelope.query_id;

    let report = worker.submit::<String>(envelope).await;
    assert!(report.is_success());
    assert_eq!(report.query_id, query_id);
    assert_eq!((report.stage_id, report.worker_id), (4, 1));
    assert_eq!(report.state(), StagePlanState::Retired);
}

#[tokio::test]
async fn test_accept_exposes_read_only_stage() {
    let worker = StageWorker::new("worker-1", ScriptedExecutor);
    let stage = worker
        .accept::<String>(&envelope("scan", 1, stage_table(None)))
        .unwrap();

    assert_eq!(stage.state(), StagePlanState::Dispatched);
    assert_eq!(stage.routes().peers(7), &[addr("A", 100, 0), addr("B", 101, 2)]);
    assert_eq!(stage.routes().peer(7, 1), Some(&addr("B", 101, 2)));
    assert!(stage.routes().peers(8).is_empty());
}

#[tokio::test]
async fn test_corrupt_payload_is_rejected() {
    let worker = StageWorker::new("worker-1", ScriptedExecutor);
    let mut envelope = envelope("scan", 0, stage_table(None));
    envelope.payload = vec![0xff, 0x01, 0x02];

    let report = worker.submit::<String>(envelope).await;
    assert!(matches!(report.outcome, StageOutcome::Rejected(_)));
}

#[tokio::test]
async fn test_executor_failure_is_reported() {
    let worker = StageWorker::new("worker-1", ScriptedExecutor);
    let report = worker.submit::<String>(envelope("boom", 2, stage_table(None))).await;
    assert_eq!(
        report.outcome,
        StageOutcome::Failed("Stage 4 failed: operator failed".to_string())
    );
}

#[tokio::test]
async fn test_stage_timeout_fails_stage() {
    let worker = StageWorker::new("worker-1", ScriptedExecutor);
    let report = worker.submit::<String>(envelope("stall", 0, stage_table(Some("20")))).await;
    assert!(matches!(report.outcome, StageOutcome::Failed(ref reason) if reason.contains("timed out")));
}

#[tokio::test]
async fn test_malformed_timeout_rejects_stage() {
    let worker = StageWorker::new("worker-1", ScriptedExecutor);
    let report = worker.submit::<String>(envelope("scan", 0, stage_table(Some("soon")))).await;
    assert!(matches!(report.outcome, StageOutcome::Rejected(_)));
}

#[tokio::test]
async fn test_serve_reports_every_plan_until_closed() {
    let worker = Arc::new(StageWorker::new("worker-1", ScriptedExecutor));
    let (plan_tx, plan_rx) = mpsc::channel(8);
    let (report_tx, mut report_rx) = mpsc::channel(8);
    let serving = tokio::spawn(Arc::clone(&worker).serve::<String>(plan_rx, report_tx));

    let table = stage_table(None);
    for worker_id in 0..3 {
        plan_tx.send(envelope("scan", worker_id, Arc::clone(&table))).await.unwrap();
    }
    drop(plan_tx);
    serving.await.unwrap();

    let mut workers = Vec::new();
    while let Some(report) = report_rx.recv().await {
        assert!(report.is_success());
        workers.push(report.worker_id);
    }
    workers.sort_unstable();
    assert_eq!(workers, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_serve_reports_panicked_stage_while_intake_is_open() {
    let worker = Arc::new(StageWorker::new("worker-1", ScriptedExecutor));
    let (plan_tx, plan_rx) = mpsc::channel(8);
    let (report_tx, mut report_rx) = mpsc::channel(8);
    let serving = tokio::spawn(Arc::clone(&worker).serve::<String>(plan_rx, report_tx));

    let table = stage_table(None);
    plan_tx.send(envelope("panic", 0, Arc::clone(&table))).await.unwrap();
    let report = report_rx.recv().await.unwrap();
    assert_eq!(
        report.outcome,
        StageOutcome::Failed("Stage 4 failed: executor panicked".to_string())
    );

    // The worker keeps serving after a panicked stage.
    for round in 0..5 {
        plan_tx.send(envelope("scan", round % 3, Arc::clone(&table))).await.unwrap();
        assert!(report_rx.recv().await.unwrap().is_success());
    }
    assert!(!serving.is_finished());

    drop(plan_tx);
    serving.await.unwrap();
    assert!(report_rx.recv().await.is_none());
}
