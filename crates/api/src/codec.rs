use std::sync::Arc;

use prost::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;
use skein_routing::{
    DistributedStagePlan, PlanFragmentMetadata, StageId, VirtualServerAddress, WorkerMetadata,
};

use crate::wire;
use crate::{Result, WireError};

/// Serializes a stage plan into its protobuf wire form.
pub fn encode_stage_plan<N: Serialize>(plan: &DistributedStagePlan<N>) -> Result<Vec<u8>> {
    let message = to_wire(plan)?;
    Ok(message.encode_to_vec())
}

/// Reconstructs a stage plan from bytes produced by [`encode_stage_plan`].
///
/// The returned plan is complete and its server resolves against its stage
/// metadata; anything short of that is an error.
pub fn decode_stage_plan<N: DeserializeOwned>(bytes: &[u8]) -> Result<DistributedStagePlan<N>> {
    let message = wire::StagePlan::decode(bytes)?;
    from_wire(message)
}

pub fn to_wire<N: Serialize>(plan: &DistributedStagePlan<N>) -> Result<wire::StagePlan> {
    let stage_id = i32::try_from(plan.stage_id())
        .map_err(|_| WireError::StageIdOverflow(plan.stage_id()))?;
    Ok(wire::StagePlan {
        stage_id,
        virtual_address: plan.server().to_string(),
        stage_root: bincode::serialize(plan.stage_root())?,
        stage_metadata: Some(stage_metadata_to_wire(plan.stage_metadata())?),
    })
}

pub fn from_wire<N: DeserializeOwned>(message: wire::StagePlan) -> Result<DistributedStagePlan<N>> {
    let stage_id = stage_id_from_wire("stage id", message.stage_id)?;
    let builder = DistributedStagePlan::builder(stage_id);

    if message.virtual_address.is_empty() {
        return Err(WireError::MissingField("virtual address"));
    }
    let builder = builder.server(message.virtual_address.parse::<VirtualServerAddress>()?);

    let stage_root: N = bincode::deserialize(&message.stage_root)?;
    let builder = builder.stage_root(stage_root);

    let metadata = message
        .stage_metadata
        .ok_or(WireError::MissingField("stage metadata"))?;
    let builder = builder.stage_metadata(Arc::new(stage_metadata_from_wire(metadata)?));

    tracing::trace!(stage_id, state = %builder.state(), "decoded stage plan fields");
    Ok(builder.build()?)
}

pub fn stage_metadata_to_wire(metadata: &PlanFragmentMetadata) -> Result<wire::StageMetadata> {
    let worker_metadata = metadata
        .workers()
        .iter()
        .map(worker_metadata_to_wire)
        .collect::<Result<Vec<_>>>()?;
    Ok(wire::StageMetadata {
        worker_metadata,
        custom_property: metadata
            .properties()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })
}

/// Rebuilds a stage's worker table, re-checking that position `i` holds worker `i`.
pub fn stage_metadata_from_wire(message: wire::StageMetadata) -> Result<PlanFragmentMetadata> {
    let workers = message
        .worker_metadata
        .into_iter()
        .map(worker_metadata_from_wire)
        .collect::<Result<Vec<_>>>()?;
    Ok(PlanFragmentMetadata::try_new(
        workers,
        message.custom_property.into_iter().collect(),
    )?)
}

fn worker_metadata_to_wire(worker: &WorkerMetadata) -> Result<wire::WorkerMetadata> {
    let mailbox_info = worker
        .mailboxes()
        .iter()
        .map(|(&stage_id, peers)| -> Result<wire::MailboxInfo> {
            Ok(wire::MailboxInfo {
                stage_id: i32::try_from(stage_id).map_err(|_| WireError::StageIdOverflow(stage_id))?,
                virtual_address: peers.iter().map(ToString::to_string).collect(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(wire::WorkerMetadata {
        virtual_address: worker.server().to_string(),
        mailbox_info,
        custom_property: worker
            .custom_properties()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })
}

fn worker_metadata_from_wire(message: wire::WorkerMetadata) -> Result<WorkerMetadata> {
    let server = message.virtual_address.parse::<VirtualServerAddress>()?;
    let mut builder = WorkerMetadata::builder(server);
    for mailbox in message.mailbox_info {
        let related_stage = stage_id_from_wire("mailbox stage id", mailbox.stage_id)?;
        let peers = mailbox
            .virtual_address
            .iter()
            .map(|peer| peer.parse::<VirtualServerAddress>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        builder = builder.peers(related_stage, peers);
    }
    for (key, value) in message.custom_property {
        builder = builder.custom_property(key, value);
    }
    Ok(builder.build())
}

fn stage_id_from_wire(field: &'static str, value: i32) -> Result<StageId> {
    StageId::try_from(value).map_err(|_| WireError::NegativeId { field, value })
}
