//! Common crate
//!
//! Shared error handling, configuration loading and logging setup for Skein.
//!
//! # Example
//! ```rust,no_run
//! #[derive(serde::Deserialize)]
//! struct Settings {
//!     port: u16,
//! }
//!
//! let settings: Settings =
//!     skein_common::config::load_settings("APP_CONFIG_PATH", "config/default.toml", "APP")?;
//! # let _ = settings.port;
//! # Ok::<(), skein_common::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat};
