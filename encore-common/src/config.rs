//! Configuration loading and database path resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Engine tuning parameters, loaded from the `[engine]` table of the config
/// file with compiled defaults for anything missing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global sweep cadence per active user (seconds)
    pub sweep_interval_secs: u64,
    /// Focused-loop fallback cadence when no next-due hint is available (seconds)
    pub focused_fallback_secs: u64,
    /// Delay before a trigger loop retries after an unhandled error (seconds)
    pub trigger_backoff_secs: u64,
    /// Cadence of the ticket-demand sweep; one sweep sells one simulated
    /// day's worth of tickets, so this defines the simulated day length (seconds)
    pub ticket_sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            focused_fallback_secs: 5,
            trigger_backoff_secs: 10,
            ticket_sweep_interval_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    database_path: Option<String>,
    #[serde(default)]
    engine: Option<EngineConfig>,
}

/// Database path resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Some(config) = read_config_file()? {
        if let Some(path) = config.database_path {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_data_dir().join("encore.db"))
}

/// Load engine tuning from the config file, falling back to defaults
pub fn load_engine_config() -> Result<EngineConfig> {
    Ok(read_config_file()?
        .and_then(|c| c.engine)
        .unwrap_or_default())
}

fn read_config_file() -> Result<Option<ConfigFile>> {
    let path = config_file_path();
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

/// Default configuration file path for the platform
fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("encore")
        .join("config.toml")
}

/// Default data directory for the platform
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("encore")
}
