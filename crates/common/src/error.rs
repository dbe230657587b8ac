use thiserror::Error;

/// Unified error type for the ambient parts of Skein crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
