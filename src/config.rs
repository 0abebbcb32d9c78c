//! Database configuration.
//!
//! [`DatabaseConfig::load`] reads the `database` section from
//! `config/config.toml` (optional) and `LIFELINE__DATABASE__*` environment
//! variables, e.g. `LIFELINE__DATABASE__URL`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "LIFELINE";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct DatabaseConfig {
    /// Connection string; absent means no store is configured
    #[serde(default)]
    pub url: Option<String>,
    /// Date format for schemas that do not set their own
    #[serde(default)]
    pub date_format: Option<String>,
}

impl DatabaseConfig {
    /// Load the database configuration from `config/config.toml`, falling back to env vars.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when neither source yields a usable `database` section.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("failed to load config file, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        Self::from_settings(&settings)
    }

    /// Extract the `database` section; a missing section yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the section exists but cannot be deserialized.
    pub fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<DatabaseConfig>("database") {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Database configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }
}
