//! Workspace config file source: config/config.toml and config/{HANDOFF_ENV}.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::Path;

/// Environment name used when `HANDOFF_ENV` is unset
pub const DEFAULT_ENV: &str = "development";

/// Add workspace config files to builder.
/// Precedence: config/config.toml (base) then config/{HANDOFF_ENV}.toml.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let config_dir = workspace_root.join("config");
    let env_name = std::env::var("HANDOFF_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = builder;
    for path in [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", env_name)),
    ] {
        if path.exists() {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }
    }
    Ok(builder)
}
