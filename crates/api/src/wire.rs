//! Protobuf messages for stage plans, generated from `proto/stage_plan.proto`.

include!(concat!(env!("OUT_DIR"), "/skein.wire.rs"));
