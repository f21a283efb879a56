//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::Config;

/// Name of the config document next to the server binary.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve executable path: {0}")]
    ExecutablePath(std::io::Error),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Default config location: `config.json` in the executable's directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::ExecutablePath)?;
    let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Parse a config document. `.toml` files use TOML, everything else JSON.
pub fn parse_config(path: &Path, content: &str) -> Result<Config, ConfigError> {
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    if is_toml {
        Ok(toml::from_str(content)?)
    } else {
        Ok(serde_json::from_str(content)?)
    }
}

/// Read and parse the config file, failing on any error.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &content)
}

/// Startup loader.
///
/// Creates an empty file when none exists. Read and decode failures are
/// logged and yield an empty configuration rather than aborting; only a
/// failure to create the missing file is returned.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        fs::File::create(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::warn!(path = %path.display(), "Config file did not exist, created empty file");
    }

    match load_config(path) {
        Ok(config) => {
            tracing::info!(
                path = %path.display(),
                instances = config.instances.len(),
                "Successfully read in config"
            );
            Ok(config)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to decode config, continuing with no instances");
            Ok(Config::default())
        }
    }
}

/// Write the config back as pretty JSON.
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
