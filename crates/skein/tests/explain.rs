use skein::coordinator::config::Settings;
use skein::coordinator::CoordinatorError;
use skein::routing::RoutingError;
use skein::PlanDescription;

fn settings(workers: &[&str]) -> Settings {
    Settings {
        default_stage_parallelism: 3,
        stage_timeout_ms: 10_000,
        workers: workers.iter().map(|w| w.to_string()).collect(),
    }
}

const JOIN: &str = r#"{
    "root_stage_id": 0,
    "stages": [
        {"stage_id": 0, "root": "receive", "input_stage_ids": [1]},
        {"stage_id": 1, "root": {"join": "customer_id"}, "input_stage_ids": [2, 3]},
        {"stage_id": 2, "root": {"scan": "orders"}, "properties": {"segments": "o_1,o_2"}},
        {"stage_id": 3, "root": {"scan": "customers"}}
    ]
}"#;

#[test]
fn test_join_description_assembles_every_worker() {
    let query = PlanDescription::from_json(JOIN)
        .unwrap()
        .assemble(&settings(&["a:1", "b:1", "c:1"]))
        .unwrap();

    assert_eq!(query.plans().len(), 10);
    let scan = query.stage_metadata(2).unwrap();
    assert_eq!(scan.property("segments"), Some("o_1,o_2"));
    assert_eq!(scan.property("timeoutMs"), Some("10000"));
    for plan in query.plans() {
        let me = plan.current_worker_metadata().unwrap();
        assert_eq!(me.server(), plan.server());
    }
}

#[test]
fn test_missing_input_stage_is_rejected() {
    let description = PlanDescription::from_json(
        r#"{"root_stage_id": 0, "stages": [{"stage_id": 0, "root": 1, "input_stage_ids": [9]}]}"#,
    )
    .unwrap();
    let err = description.assemble(&settings(&["a:1"])).unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidPlan(_)));
}

#[test]
fn test_no_workers_anywhere_is_rejected() {
    let err = PlanDescription::from_json(JOIN)
        .unwrap()
        .assemble(&settings(&[]))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NoWorkers));
}

#[test]
fn test_bad_timeout_property_surfaces_on_read() {
    let query = PlanDescription::from_json(
        r#"{"root_stage_id": 0, "stages": [{"stage_id": 0, "root": 1, "properties": {"timeoutMs": "later"}}]}"#,
    )
    .unwrap()
    .assemble(&settings(&["a:1"]))
    .unwrap();
    let err = query.stage_metadata(0).unwrap().timeout().unwrap_err();
    assert!(matches!(err, RoutingError::InvalidProperty { .. }));
}
