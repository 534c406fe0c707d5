use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, LoggingSettings, RankingLimits, SourceKind, SourceSettings};

/// Loads the application configuration from the `config.toml` file.
///
/// The file is optional: every section falls back to its defaults. Values can be
/// overridden through the environment, e.g. `STOCKDASH__RANKINGS__YEARLY_TOP=20`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new("config.toml"))
}

/// Same as [`load_config`] but reads the given file instead of `config.toml`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("STOCKDASH").separator("__"))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(path = %path.display(), source = ?config.source.kind, "Configuration loaded.");
    Ok(config)
}
