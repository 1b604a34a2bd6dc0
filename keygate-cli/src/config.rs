//! CLI configuration handling.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use directories::ProjectDirs;
use keygate_core::{ControllerConfig, DEFAULT_KEYRING_SERVICE, Provider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the selected key lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The provider's environment variable.
    Env,

    /// The OS keyring, falling back to memory when unavailable.
    #[default]
    Keyring,

    /// Process memory only.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Provider whose key is managed.
    pub provider: Provider,

    /// Key backend.
    pub backend: Backend,

    /// Keyring service the key is filed under.
    pub keyring_service: String,

    /// Logging level used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Controller settings.
    pub controller: ControllerConfig,

    /// Path of the file that was loaded, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            backend: Backend::default(),
            keyring_service: DEFAULT_KEYRING_SERVICE.to_string(),
            log_level: "warn".to_string(),
            controller: ControllerConfig::default(),
            config_path: None,
        }
    }
}

/// Load configuration.
///
/// An explicit path must exist. Without one, `config.toml` in the platform
/// config directory is read if present, otherwise defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file {:?} does not exist", path);
            }
            load_from_path(path)
        }
        None => match default_config_path() {
            Some(path) if path.exists() => load_from_path(&path),
            _ => Ok(CliConfig::default()),
        },
    }
}

fn load_from_path(path: &Path) -> Result<CliConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    let mut config: CliConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config from {:?}", path))?;
    config.config_path = Some(path.to_path_buf());
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "raibid-labs", "keygate").map(|d| d.config_dir().join("config.toml"))
}
