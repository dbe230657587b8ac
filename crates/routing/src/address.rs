use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{RoutingError, WorkerId};

/// One worker instance within one stage: physical host and port plus the
/// worker's dense index in that stage's worker set.
///
/// The worker id is only unique within a single stage. Two stages may both have
/// a worker 0 on the same physical server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirtualServerAddress {
    host: String,
    port: u16,
    worker_id: WorkerId,
}

impl VirtualServerAddress {
    pub fn new(host: impl Into<String>, port: u16, worker_id: WorkerId) -> Self {
        Self {
            host: host.into(),
            port,
            worker_id,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// `host:port` of the physical server behind this address.
    pub fn physical_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Formats as `worker_id@host:port`.
impl fmt::Display for VirtualServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.worker_id, self.host, self.port)
    }
}

impl FromStr for VirtualServerAddress {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RoutingError::InvalidAddress(s.to_string());

        let (worker_id, hostport) = s.split_once('@').ok_or_else(invalid)?;
        let (host, port) = hostport.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let worker_id = worker_id.parse::<WorkerId>().map_err(|_| invalid())?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self::new(host, port, worker_id))
    }
}
