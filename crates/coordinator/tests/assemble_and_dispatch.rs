use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skein_api::{decode_stage_plan, StageEnvelope};
use skein_coordinator::{
    ChannelTransport, CoordinatorError, MultiStagePlan, QueryDispatcher, QueryStage,
    ServerInstance, StagePlanAssembler, WorkerAssignment,
};
use skein_routing::{DistributedStagePlan, StagePlanState, VirtualServerAddress, TIMEOUT_MS_KEY};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Operator {
    Receive,
    HashJoin { on: String },
    Scan { table: String },
}

// stage 0 <- stage 1 (join) <- stages 2, 3 (scans)
fn join_query() -> MultiStagePlan<Operator> {
    MultiStagePlan::try_new(
        0,
        vec![
            QueryStage::new(0, Operator::Receive).with_inputs([1]),
            QueryStage::new(1, Operator::HashJoin { on: "customer_id".into() }).with_inputs([2, 3]),
            QueryStage::new(2, Operator::Scan { table: "orders".into() }),
            QueryStage::new(3, Operator::Scan { table: "customers".into() }),
        ],
    )
    .unwrap()
}

fn pool() -> Vec<ServerInstance> {
    (1..=3).map(|i| ServerInstance::new(format!("worker-{i}"), 7000 + i)).collect()
}

#[test]
fn test_assembly_shares_one_table_per_stage() {
    let plan = join_query();
    let assignment = WorkerAssignment::round_robin(&plan, &pool(), 3).unwrap();
    let query = StagePlanAssembler::new()
        .with_stage_property(TIMEOUT_MS_KEY, "10000")
        .assemble(&plan, &assignment)
        .unwrap();

    // 1 root worker + 3 workers for each of the other three stages.
    assert_eq!(query.plans().len(), 10);
    assert!(query.topology().validate().is_ok());

    for stage_id in plan.stage_ids() {
        let shared = query.stage_metadata(stage_id).unwrap();
        for (k, stage_plan) in query.plans_for(stage_id).enumerate() {
            assert!(Arc::ptr_eq(stage_plan.stage_metadata(), shared));
            assert_eq!(stage_plan.server().worker_id(), k);
            assert_eq!(stage_plan.current_worker_metadata().unwrap().server(), stage_plan.server());
        }
    }

    let join_worker = query.plans_for(1).nth(2).unwrap().current_worker_metadata().unwrap();
    let orders_workers: Vec<_> = query.stage_metadata(2).unwrap().servers().cloned().collect();
    assert_eq!(join_worker.peers(2), orders_workers.as_slice());
    assert_eq!(join_worker.peers(3).len(), 3);
    assert_eq!(join_worker.peers(0).len(), 1);
    assert!(join_worker.peers(1).is_empty());
}

#[tokio::test]
async fn test_dispatch_delivers_every_plan() -> anyhow::Result<()> {
    let plan = join_query();
    let pool = pool();
    let assignment = WorkerAssignment::round_robin(&plan, &pool, 2)?;
    let query = StagePlanAssembler::new().assemble(&plan, &assignment)?;
    let expected = query.plans().len();

    let mut transport = ChannelTransport::new();
    let mut receivers = HashMap::new();
    for server in &pool {
        let (tx, rx) = mpsc::channel::<StageEnvelope>(16);
        transport.register(server.to_string(), tx);
        receivers.insert(server.to_string(), rx);
    }

    let dispatcher = QueryDispatcher::new(transport);
    let dispatched = dispatcher.dispatch(query).await?;
    assert_eq!(dispatched.targets().len(), expected);
    assert_eq!(dispatched.state(), StagePlanState::Dispatched);

    let mut received = 0;
    for (physical, rx) in receivers.iter_mut() {
        while let Ok(envelope) = rx.try_recv() {
            assert_eq!(envelope.query_id, dispatched.query_id());
            assert_eq!(&envelope.server.physical_address(), physical);

            let stage_plan: DistributedStagePlan<Operator> = decode_stage_plan(&envelope.payload)?;
            assert_eq!(stage_plan.stage_id(), envelope.stage_id);
            assert_eq!(stage_plan.server(), &envelope.server);
            stage_plan.current_worker_metadata()?;
            received += 1;
        }
    }
    assert_eq!(received, expected);
    Ok(())
}

#[tokio::test]
async fn test_dispatch_to_unknown_worker_fails() {
    let plan = MultiStagePlan::try_new(0, vec![QueryStage::new(0, Operator::Receive)]).unwrap();
    let assignment = WorkerAssignment::new().assign(0, vec![ServerInstance::new("ghost", 1)]);
    let query = StagePlanAssembler::new().assemble(&plan, &assignment).unwrap();

    let dispatcher = QueryDispatcher::new(ChannelTransport::new());
    let err = dispatcher.dispatch(query).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::WorkerNotFound(ref server) if server == "ghost:1"));
}

#[test]
fn test_virtual_addresses_follow_assignment_order() {
    let assignment = WorkerAssignment::new().assign(
        4,
        vec![ServerInstance::new("b", 2), ServerInstance::new("a", 1)],
    );
    assert_eq!(
        assignment.virtual_addresses(4).unwrap(),
        vec![VirtualServerAddress::new("b", 2, 0), VirtualServerAddress::new("a", 1, 1)]
    );
}

#[test]
fn test_stages_load_from_json() {
    let stages: Vec<QueryStage<Operator>> = serde_json::from_str(
        r#"[
            {"stage_id": 0, "root": "Receive", "input_stage_ids": [1]},
            {"stage_id": 1, "root": {"Scan": {"table": "orders"}}, "properties": {"segments": "o_1"}}
        ]"#,
    )
    .unwrap();
    let plan = MultiStagePlan::try_new(0, stages).unwrap();
    assert_eq!(plan.consumer_of(1), Some(0));
    assert_eq!(plan.stage(1).unwrap().properties["segments"], "o_1");
}
