use serde::Deserialize;

use skein_routing::TIMEOUT_MS_KEY;

use crate::assembler::StagePlanAssembler;
use crate::assignment::ServerInstance;
use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_stage_parallelism")]
    pub default_stage_parallelism: usize,
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
    #[serde(default)]
    pub workers: Vec<String>,
}

fn default_stage_parallelism() -> usize {
    2
}

fn default_stage_timeout_ms() -> u64 {
    10_000
}

impl Settings {
    pub fn new() -> skein_common::Result<Self> {
        skein_common::config::load_settings(
            "COORDINATOR_CONFIG_PATH",
            "crates/coordinator/config/default.toml",
            "SKEIN_COORDINATOR",
        )
    }

    pub fn worker_pool(&self) -> Result<Vec<ServerInstance>> {
        self.workers.iter().map(|w| w.parse()).collect()
    }

    /// An assembler stamping the configured stage timeout onto every stage.
    pub fn assembler(&self) -> StagePlanAssembler {
        StagePlanAssembler::new().with_stage_property(TIMEOUT_MS_KEY, self.stage_timeout_ms.to_string())
    }
}
