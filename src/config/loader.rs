use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Prefix for environment overrides, e.g. `MESHGATE_AUTH__API_KEY`.
pub const ENV_PREFIX: &str = "MESHGATE";

/// Load configuration from a file using the config crate
/// Supports multiple formats: YAML, JSON, TOML, etc.
pub async fn load_config(config_path: &str) -> Result<ServerConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously, layering `MESHGATE_*` environment
/// variables over the file.
pub fn load_config_sync(config_path: &str) -> Result<ServerConfig> {
    build_config(config_path, true)
}

/// Load the file alone, ignoring the environment (used by `validate`)
pub async fn load_config_unchecked(config_path: &str) -> Result<ServerConfig> {
    build_config(config_path, false)
}

fn build_config(config_path: &str, with_env: bool) -> Result<ServerConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml,
    };

    let mut builder = Config::builder().add_source(File::new(
        config_path
            .to_str()
            .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
        format,
    ));

    if with_env {
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
    }

    let settings = builder
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let server_config: ServerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(server_config)
}
