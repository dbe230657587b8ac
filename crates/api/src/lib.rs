//! API crate
//!
//! Wire messages carrying a [`DistributedStagePlan`](skein_routing::DistributedStagePlan)
//! from the coordinator to a worker, and the conversions on both sides.
//!
//! The operator tree travels as an opaque `bincode` payload; everything else
//! (stage id, addresses, worker table, stage properties) is mapped onto
//! protobuf messages so other runtimes can read it.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod wire;

pub use codec::{decode_stage_plan, encode_stage_plan, from_wire, to_wire};
pub use envelope::StageEnvelope;
pub use error::{Result, WireError};
