//! CLI configuration utilities

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sessiongate_client::ClientConfig;
use std::path::{Path, PathBuf};

/// Name of the optional config file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Prefix of environment overrides, e.g. `SESSIONGATE__API__BASE_URL`
const ENV_PREFIX: &str = "SESSIONGATE";

/// CLI settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Auth API client settings
    pub api: ClientConfig,
}

impl Settings {
    /// Load settings from defaults, `<data_dir>/config.toml` (or `file`) and
    /// the environment, later sources winning.
    pub fn load(data_dir: &Path, file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(data_dir.join(CONFIG_FILE)).required(false),
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        Ok(settings.try_deserialize()?)
    }
}

/// Data directory: explicit flag or `SESSIONGATE_STATE_DIR`, else the
/// platform data directory.
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir {
        return Ok(dir);
    }
    ProjectDirs::from("", "", "sessiongate")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("Could not determine a data directory; pass --data-dir")
}

/// Write the default settings as TOML
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let content = toml::to_string_pretty(&Settings::default())?;
    std::fs::write(path, content)?;
    Ok(())
}
