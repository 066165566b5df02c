//! Layered engine configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults (`EngineConfig::default()`),
//! 2. an optional TOML or JSON file,
//! 3. `VERSUS__SECTION__KEY` environment variables.
//!
//! The merged result is validated before it is returned.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::{debug, info};

use versus_core::config::EngineConfig;
use versus_core::error::ConfigError;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "VERSUS";

/// Default location of the engine config file, if the platform has a config
/// directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("versus").join("engine.toml"))
}

/// Load and validate the engine configuration.
///
/// A missing file is not an error; a malformed one is.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    load_with_env(path, Environment::with_prefix(ENV_PREFIX).separator("__"))
}

fn load_with_env(path: Option<&Path>, env: Environment) -> Result<EngineConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        debug!(path = %path.display(), exists = path.exists(), "config: file source");
        builder = builder.add_source(File::from(path).required(false));
    }
    let merged = builder
        .add_source(env.try_parsing(true))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let config: EngineConfig = merged
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;
    config.validate()?;
    info!(
        trending_cap = config.discovery.trending_diversity_cap,
        min_votes = config.consensus.min_votes,
        "config: loaded"
    );
    Ok(config)
}
