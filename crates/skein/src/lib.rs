//! Umbrella crate for the Skein stage runtime.
//!
//! Re-exports the component crates and holds the plan description used by the
//! `skein explain` command.

use std::fmt::Write;

use serde::Deserialize;
use skein_coordinator::config::Settings;
use skein_coordinator::{AssembledQuery, MultiStagePlan, QueryStage, Result, WorkerAssignment};
use skein_routing::{StageId, TIMEOUT_MS_KEY};

pub use skein_api as api;
pub use skein_common as common;
pub use skein_coordinator as coordinator;
pub use skein_routing as routing;
pub use skein_worker as worker;

/// A compiled query as read from JSON. Operator trees stay opaque JSON values.
///
/// Fields left out fall back to the coordinator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanDescription {
    pub root_stage_id: StageId,
    pub stages: Vec<QueryStage<serde_json::Value>>,
    #[serde(default)]
    pub workers: Vec<String>,
    pub parallelism: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl PlanDescription {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Validates the stage graph, assigns workers and assembles every plan.
    pub fn assemble(self, settings: &Settings) -> Result<AssembledQuery<serde_json::Value>> {
        let pool = if self.workers.is_empty() {
            settings.worker_pool()?
        } else {
            self.workers.iter().map(|w| w.parse()).collect::<Result<Vec<_>>>()?
        };
        let parallelism = self.parallelism.unwrap_or(settings.default_stage_parallelism);
        let mut assembler = settings.assembler();
        if let Some(timeout_ms) = self.timeout_ms {
            assembler = assembler.with_stage_property(TIMEOUT_MS_KEY, timeout_ms.to_string());
        }

        let plan = MultiStagePlan::try_new(self.root_stage_id, self.stages)?;
        let assignment = WorkerAssignment::round_robin(&plan, &pool, parallelism)?;
        assembler.assemble(&plan, &assignment)
    }
}

/// Per-worker routing of an assembled query, one block per stage.
pub fn render_routing<N>(query: &AssembledQuery<N>) -> String {
    let mut out = String::new();
    for stage_id in query.topology().stage_ids() {
        let Some(metadata) = query.stage_metadata(stage_id) else {
            continue;
        };
        let _ = writeln!(out, "stage {} ({} workers)", stage_id, metadata.num_workers());
        for (key, value) in metadata.properties() {
            let _ = writeln!(out, "  {key} = {value}");
        }
        for worker in metadata.workers() {
            let _ = writeln!(out, "  {}", worker.server());
            for related in worker.related_stages() {
                let peers: Vec<String> = worker.peers(related).iter().map(ToString::to_string).collect();
                let _ = writeln!(out, "    stage {related}: {}", peers.join(", "));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            default_stage_parallelism: 2,
            stage_timeout_ms: 5000,
            workers: vec!["10.0.0.1:7000".to_string(), "10.0.0.2:7000".to_string()],
        }
    }

    #[test]
    fn test_render_two_stage_query() {
        let description = PlanDescription::from_json(
            r#"{
                "root_stage_id": 0,
                "stages": [
                    {"stage_id": 0, "root": {"op": "receive"}, "input_stage_ids": [1]},
                    {"stage_id": 1, "root": {"op": "scan", "table": "orders"}}
                ]
            }"#,
        )
        .unwrap();
        let query = description.assemble(&settings()).unwrap();
        let rendered = render_routing(&query);

        assert_eq!(
            rendered,
            "stage 0 (1 workers)\n\
             \x20 timeoutMs = 5000\n\
             \x20 0@10.0.0.1:7000\n\
             \x20   stage 1: 0@10.0.0.2:7000, 1@10.0.0.1:7000\n\
             stage 1 (2 workers)\n\
             \x20 timeoutMs = 5000\n\
             \x20 0@10.0.0.2:7000\n\
             \x20   stage 0: 0@10.0.0.1:7000\n\
             \x20 1@10.0.0.1:7000\n\
             \x20   stage 0: 0@10.0.0.1:7000\n"
        );
    }

    #[test]
    fn test_description_overrides_settings() {
        let description = PlanDescription::from_json(
            r#"{
                "root_stage_id": 0,
                "stages": [{"stage_id": 0, "root": null}],
                "workers": ["solo:1"],
                "timeout_ms": 250
            }"#,
        )
        .unwrap();
        let query = description.assemble(&settings()).unwrap();
        let metadata = query.stage_metadata(0).unwrap();
        assert_eq!(metadata.property(TIMEOUT_MS_KEY), Some("250"));
        assert_eq!(metadata.worker_metadata_at(0).unwrap().server().host(), "solo");
    }
}
