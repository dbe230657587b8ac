//! Layered settings loading shared by the coordinator and the worker.
//!
//! Settings come from a TOML file whose path is read from an environment
//! variable (falling back to a default path), overridden by prefixed
//! environment variables such as `SKEIN_WORKER__WORKER_PORT=9000`.

use ::config::{Config, Environment, File};
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Loads settings from the file named by `path_env` (or `default_path`),
/// layered under environment variables starting with `env_prefix`.
pub fn load_settings<T: DeserializeOwned>(
    path_env: &str,
    default_path: &str,
    env_prefix: &str,
) -> Result<T> {
    let config_file_path =
        std::env::var(path_env).unwrap_or_else(|_| default_path.to_string());
    tracing::debug!(path = %config_file_path, prefix = env_prefix, "loading settings");
    load_settings_from(&config_file_path, env_prefix)
}

/// Same as [`load_settings`] with an explicit file path.
pub fn load_settings_from<T: DeserializeOwned>(
    config_file_path: &str,
    env_prefix: &str,
) -> Result<T> {
    let s = Config::builder()
        .add_source(File::with_name(config_file_path).required(true))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()?;
    Ok(s.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        host: String,
        port: u16,
        #[serde(default = "default_retries")]
        retries: u32,
    }

    fn default_retries() -> u32 {
        3
    }

    #[test]
    fn test_load_settings_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "host = \"127.0.0.1\"\nport = 7000").unwrap();

        let sample: Sample =
            load_settings_from(path.to_str().unwrap(), "SKEIN_COMMON_TEST_UNUSED").unwrap();
        assert_eq!(sample.host, "127.0.0.1");
        assert_eq!(sample.port, 7000);
        assert_eq!(sample.retries, 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result: Result<Sample> =
            load_settings_from("/definitely/not/here/settings.toml", "SKEIN_COMMON_TEST_UNUSED");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}
