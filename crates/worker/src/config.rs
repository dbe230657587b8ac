use serde::Deserialize;

use crate::error::{Result, WorkerError};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub instance_id: String,
    /// Where the host process's plan transport listens. The coordinator lists
    /// this worker as `worker_host:worker_port`.
    pub worker_host: String,
    pub worker_port: u16,
    #[serde(default = "default_admin_listeners")]
    pub admin_listeners: Vec<ListenerConfig>,
}

/// One admin API listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_admin_listeners() -> Vec<ListenerConfig> {
    vec![ListenerConfig::http("admin", "0.0.0.0", 8097)]
}

impl ListenerConfig {
    pub fn http(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            protocol: default_protocol(),
        }
    }

    /// Host and port as handed to the resolver, so host names work too.
    pub fn bind_address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    pub(crate) fn check_protocol(&self) -> Result<()> {
        if self.protocol.eq_ignore_ascii_case("http") {
            Ok(())
        } else {
            Err(WorkerError::UnsupportedProtocol {
                listener: self.name.clone(),
                protocol: self.protocol.clone(),
            })
        }
    }
}

impl Settings {
    pub fn new() -> skein_common::Result<Self> {
        skein_common::config::load_settings(
            "WORKER_CONFIG_PATH",
            "crates/worker/config/default.toml",
            "SKEIN_WORKER",
        )
    }

    /// `host:port` under which dispatched plans address this worker.
    pub fn worker_server_address(&self) -> String {
        format!("{}:{}", self.worker_host, self.worker_port)
    }
}
