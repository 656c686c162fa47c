//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Config path from `CONFIG_PATH`, falling back to `config.toml`.
pub fn config_path() -> String {
  std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
  let path = path.as_ref();

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    name = %config.engine.name,
    data_dir = %config.persistence.data_dir,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.engine.name.trim().is_empty(),
    "engine.name must not be empty"
  );
  anyhow::ensure!(
    matches!(
      config.engine.log_level.as_str(),
      "trace" | "debug" | "info" | "warn" | "error"
    ),
    "engine.log_level must be one of trace/debug/info/warn/error, got {}",
    config.engine.log_level
  );

  anyhow::ensure!(
    !config.persistence.data_dir.is_empty(),
    "persistence.data_dir must not be empty"
  );
  anyhow::ensure!(
    config.persistence.snapshot_interval_seconds > 0,
    "persistence.snapshot_interval_seconds must be positive"
  );

  if config.metrics.enabled {
    config
      .metrics
      .bind_address
      .parse::<std::net::SocketAddr>()
      .with_context(|| format!("Invalid metrics.bind_address: {}", config.metrics.bind_address))?;
  }

  Ok(())
}
