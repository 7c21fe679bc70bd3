//! Configuration loading
//!
//! Layers embedded defaults, optional config files, and TASKBEAT_*
//! environment variables, later sources overriding earlier ones.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

use crate::config::AppConfig;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

fn environment_name() -> String {
    std::env::var("TASKBEAT_ENV").unwrap_or_else(|_| "development".to_string())
}

/// Load configuration from embedded defaults, files, and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{}", environment_name())).required(false))
        .add_source(File::with_name("config/local").required(false))
        // prefix_separator("_") keeps env keys in the TASKBEAT_SECTION__FIELD
        // shape; config-rs 0.14 would otherwise expect TASKBEAT__SECTION__FIELD.
        .add_source(
            Environment::with_prefix("TASKBEAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
