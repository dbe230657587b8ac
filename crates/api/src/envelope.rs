use uuid::Uuid;

use skein_routing::{StageId, VirtualServerAddress};

/// An encoded stage plan on its way to one worker.
///
/// The transport moving envelopes is external; this is only what it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEnvelope {
    pub query_id: Uuid,
    pub stage_id: StageId,
    pub server: VirtualServerAddress,
    /// Bytes produced by [`encode_stage_plan`](crate::encode_stage_plan).
    pub payload: Vec<u8>,
}
