//! The on-disk copy of the gateway configuration.
//!
//! Every node keeps its current [`GlobalConfig`] in a JSON file so it can restart
//! from the last known state even when the store is unreachable.

use std::fs;
use std::path::{Path, PathBuf};

use syncman_types::{ConfigError, GlobalConfig};

/// Load the config file. A missing file yields an empty config.
pub fn load_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
    if !path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
        message: format!("failed to read {}: {}", path.display(), e),
    })?;

    if content.trim().is_empty() {
        return Ok(GlobalConfig::default());
    }

    serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))
}

/// Write the config file atomically (temp file + rename).
pub fn save_config(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::from_io_error(&e))?;
    }

    let content =
        serde_json::to_string_pretty(config).map_err(|e| ConfigError::from_json_error(&e))?;

    let temp_path = temp_path_for(path);
    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::from_io_error(&e))
}

/// Load, modify, and save in one step.
pub fn update_config<F>(path: &Path, updater: F) -> Result<GlobalConfig, ConfigError>
where
    F: FnOnce(&mut GlobalConfig),
{
    let mut config = load_config(path)?;
    updater(&mut config);
    save_config(path, &config)?;
    Ok(config)
}

/// [`save_config`] off the async runtime.
pub async fn persist(path: PathBuf, config: GlobalConfig) -> Result<(), ConfigError> {
    tokio::task::spawn_blocking(move || save_config(&path, &config))
        .await
        .map_err(|e| ConfigError::WriteError { message: format!("task join error: {e}") })?
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
