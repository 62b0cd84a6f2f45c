//! Client configuration.
//!
//! Resolution order: built-in defaults, then an optional TOML file
//! (`$XDG_CONFIG_HOME/agora/config.toml` unless overridden), then
//! `AGORA`-prefixed environment variables (`AGORA__SERVER_URL=...`).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::ClientResult;

const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const ENV_PREFIX: &str = "AGORA";

/// Settings for [`crate::GameClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the game server.
    pub server_url: String,

    /// Timeout for establishing a connection, in seconds. Streaming reads
    /// have no timeout: a turn is drained until the server closes it.
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load configuration, optionally from an explicit file path.
    pub fn load(config_file: Option<&Path>) -> ClientResult<Self> {
        let file = config_file
            .map(Path::to_path_buf)
            .or_else(Self::default_config_file);

        let mut builder = Config::builder()
            .set_default("server_url", DEFAULT_SERVER_URL)?
            .set_default("connect_timeout_secs", DEFAULT_CONNECT_TIMEOUT_SECS as i64)?;

        if let Some(path) = file {
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let built = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(built.try_deserialize()?)
    }

    /// Default config file location, when a config directory exists.
    pub fn default_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("agora").join("config.toml"))
    }
}
