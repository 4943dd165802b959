//! Configuration file loader.
//!
//! Reads an optional `fencecast.toml` and deserializes it into
//! [`FencecastConfig`]. Falls back to defaults when the file is missing or
//! malformed, so the relay can always start.

use std::path::{Path, PathBuf};

use fencecast_types::config::FencecastConfig;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "fencecast.toml";

/// Path to load: the explicit one, or `fencecast.toml` in the working directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`FencecastConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and
///   returns the default.
/// - Otherwise returns the parsed config (missing fields take defaults).
pub async fn load_config(path: &Path) -> FencecastConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return FencecastConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return FencecastConfig::default();
        }
    };

    match toml::from_str::<FencecastConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            FencecastConfig::default()
        }
    }
}
