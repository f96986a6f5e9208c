//! Configuration for petlife.
//!
//! Settings are loaded with priority: env var > config.toml > default.
//! `./.env` and `~/.petlife/.env` are loaded via dotenvy before anything
//! else, so values placed there behave like real env vars.

pub(crate) mod helpers;

use std::path::{Path, PathBuf};

use crate::contract::DeploymentTable;
use crate::error::ConfigError;
use crate::fhe::DEFAULT_DURATION_DAYS;
use crate::settings::{Settings, petlife_home};

/// Env var naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "PETLIFE_CONFIG_PATH";

/// Main configuration for the client.
#[derive(Debug, Clone)]
pub struct Config {
    pub deployments: DeploymentTable,
    pub authorization: AuthorizationConfig,
    pub log_format: LogFormat,
}

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'pretty' or 'json', got '{value}'"),
            }),
        }
    }

    pub fn resolve() -> Result<Self, ConfigError> {
        helpers::optional_env("PETLIFE_LOG_FORMAT")?
            .map(|value| Self::parse(&value, "PETLIFE_LOG_FORMAT"))
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

/// Decryption authorization cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationConfig {
    pub duration_days: u32,
    pub store_path: PathBuf,
}

impl AuthorizationConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let duration_days = helpers::parse_optional_env::<u32>(
            "PETLIFE_AUTH_DURATION_DAYS",
            "a positive integer",
        )?
        .or(settings.authorization.duration_days)
        .unwrap_or(DEFAULT_DURATION_DAYS);
        if duration_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PETLIFE_AUTH_DURATION_DAYS".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let store_path = helpers::optional_env("PETLIFE_AUTH_STORE_PATH")?
            .or_else(|| settings.authorization.store_path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(default_authorization_store_path);

        Ok(Self {
            duration_days,
            store_path,
        })
    }
}

fn default_authorization_store_path() -> PathBuf {
    petlife_home().join("authorizations.json")
}

impl Config {
    /// Load from env and the default (or `PETLIFE_CONFIG_PATH`) TOML file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_toml(None)
    }

    /// Load from env with an optional explicit TOML config file.
    pub fn from_env_with_toml(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        crate::bootstrap::load_petlife_env();
        let settings = Self::load_settings(toml_path)?;
        Self::build(&settings)
    }

    /// Path of the config file in effect: explicit, then
    /// `PETLIFE_CONFIG_PATH`, then `~/.petlife/config.toml`.
    pub fn settings_path(explicit_path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
        if let Some(path) = explicit_path {
            return Ok((path.to_path_buf(), true));
        }
        Ok(match helpers::optional_env(CONFIG_PATH_ENV)? {
            Some(path) => (PathBuf::from(path), true),
            None => (Settings::default_toml_path(), false),
        })
    }

    /// Load the TOML settings.
    ///
    /// An explicitly named file must exist and parse. The default path is
    /// optional, and a broken default file only logs a warning.
    pub fn load_settings(explicit_path: Option<&Path>) -> Result<Settings, ConfigError> {
        let (path, explicit) = Self::settings_path(explicit_path)?;

        match Settings::load_toml(&path) {
            Ok(Some(settings)) => {
                tracing::debug!("Loaded TOML config from {}", path.display());
                Ok(settings)
            }
            Ok(None) if explicit => Err(ConfigError::ParseError(format!(
                "Config file not found: {}",
                path.display()
            ))),
            Ok(None) => Ok(Settings::default()),
            Err(e) if explicit => Err(ConfigError::ParseError(format!(
                "Failed to load config file {}: {}",
                path.display(),
                e
            ))),
            Err(e) => {
                tracing::warn!("Failed to load default config file: {}", e);
                Ok(Settings::default())
            }
        }
    }

    pub fn build(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            deployments: settings.deployment_table(),
            authorization: AuthorizationConfig::resolve(settings)?,
            log_format: LogFormat::resolve()?,
        })
    }
}
