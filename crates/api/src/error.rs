use skein_routing::RoutingError;
use thiserror::Error;

/// Failures at the wire boundary.
///
/// A plan that fails here never reaches the execution engine.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Failed to decode stage plan message")]
    Decode(#[from] prost::DecodeError),

    #[error("Failed to (de)serialize stage root payload")]
    Payload(#[from] bincode::Error),

    #[error("Stage plan message is missing {0}")]
    MissingField(&'static str),

    #[error("Negative {field} {value} in stage plan message")]
    NegativeId { field: &'static str, value: i32 },

    #[error("Stage id {0} does not fit the wire format")]
    StageIdOverflow(u32),

    #[error("Inconsistent stage plan: {0}")]
    Routing(#[from] RoutingError),
}

pub type Result<T> = std::result::Result<T, WireError>;
