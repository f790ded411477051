//! Configuration for tweakctl.
//!
//! Looked up in order: `$TWEAKCTL_CONFIG`, `~/.config/tweakctl/config.toml`,
//! `/etc/tweakctl/config.toml`. Defaults apply when none exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tweak_engine::EngineConfig;

/// System-wide config file path
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tweakctl/config.toml";

/// Daemon socket used when nothing else is configured
pub const DEFAULT_SOCKET_PATH: &str = "/run/tweakd/tweakd.sock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtlConfig {
    /// Path to the daemon socket
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// How long to keep retrying the initial connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Default log filter, overridden by $TWEAKCTL_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

fn default_connect_timeout() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for CtlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connect_timeout_ms: default_connect_timeout(),
            log_level: default_log_level(),
            engine: EngineConfig::default(),
        }
    }
}

impl CtlConfig {
    /// Load from the first config file found, or defaults
    pub fn load() -> Result<Self> {
        match Self::discover_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load a specific file. A malformed file is an error, not a fallback.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: CtlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn discover_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TWEAKCTL_CONFIG") {
            return Some(PathBuf::from(path));
        }

        if let Some(dir) = dirs::config_dir() {
            let user = dir.join("tweakctl").join("config.toml");
            if user.exists() {
                return Some(user);
            }
        }

        let system = PathBuf::from(SYSTEM_CONFIG_PATH);
        if system.exists() {
            return Some(system);
        }

        None
    }
}
