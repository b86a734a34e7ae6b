//! Config file loading.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::types::RunConfig;

/// Load the run config from a JSON file. No path means defaults; a path that
/// does not exist falls back to defaults with a warning.
pub async fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let Some(config_path) = path else {
        return Ok(RunConfig::default());
    };

    if !config_path.exists() {
        warn!("Config file not found: {:?}. Using defaults.", config_path);
        return Ok(RunConfig::default());
    }

    let content = tokio::fs::read_to_string(config_path)
        .await
        .with_context(|| format!("Failed to read config: {:?}", config_path))?;
    let config: RunConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config JSON: {:?}", config_path))?;

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", config_path))?;

    info!("Loaded configuration from: {:?}", config_path);
    Ok(config)
}
