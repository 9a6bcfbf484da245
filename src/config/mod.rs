//! Configuration loading for the data-access layer.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `DIRECTORY_`, producing a typed [`RepoConfig`].

use std::{collections::BTreeMap, env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "DIRECTORY_";

/// Upper bound accepted for `MAX_PAGE_SIZE`.
pub const PAGE_SIZE_CEILING: u32 = 10_000;

/// Data-access configuration derived from `DIRECTORY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RepoConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Largest page a pageable query may request.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Deadline applied to contexts built with `Context::from_config`.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            max_page_size: default_max_page_size(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl RepoConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    /// Validates the configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 || self.max_page_size > PAGE_SIZE_CEILING {
            return Err(ConfigError::InvalidMaxPageSize {
                value: self.max_page_size,
            });
        }

        if self.statement_timeout_ms == 0 {
            return Err(ConfigError::InvalidStatementTimeout {
                value: self.statement_timeout_ms,
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_page_size() -> u32 {
    200
}

fn default_statement_timeout_ms() -> u64 {
    30_000 // 30 seconds
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber { key: String, value: String },
    #[error("max page size must be between 1 and {PAGE_SIZE_CEILING}, got {value}")]
    InvalidMaxPageSize { value: u32 },
    #[error("statement timeout must be positive, got {value}")]
    InvalidStatementTimeout { value: u64 },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
}

/// Loads configuration using layered `.env` files and `DIRECTORY_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.<profile>`, `.env.<profile>.local`, then
    /// the process environment, later layers winning.
    pub fn load(&self) -> Result<RepoConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let max_page_size = parse_number(&mut layered, "MAX_PAGE_SIZE")?
            .unwrap_or_else(default_max_page_size);
        let statement_timeout_ms = parse_number(&mut layered, "STATEMENT_TIMEOUT_MS")?
            .unwrap_or_else(default_statement_timeout_ms);

        let config = RepoConfig {
            profile,
            log_level,
            log_format,
            max_page_size,
            statement_timeout_ms,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match layered.remove(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                key: format!("{ENV_PREFIX}{key}"),
                value: raw,
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RepoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_page_size, 200);
        assert_eq!(config.statement_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validation_bounds() {
        let zero_page = RepoConfig {
            max_page_size: 0,
            ..RepoConfig::default()
        };
        assert!(matches!(
            zero_page.validate(),
            Err(ConfigError::InvalidMaxPageSize { value: 0 })
        ));

        let huge_page = RepoConfig {
            max_page_size: PAGE_SIZE_CEILING + 1,
            ..RepoConfig::default()
        };
        assert!(huge_page.validate().is_err());

        let no_timeout = RepoConfig {
            statement_timeout_ms: 0,
            ..RepoConfig::default()
        };
        assert!(matches!(
            no_timeout.validate(),
            Err(ConfigError::InvalidStatementTimeout { .. })
        ));

        let bad_format = RepoConfig {
            log_format: "xml".to_string(),
            ..RepoConfig::default()
        };
        assert!(matches!(
            bad_format.validate(),
            Err(ConfigError::InvalidLogFormat { .. })
        ));
    }

    #[test]
    fn test_parse_number_reports_key() {
        let mut layered = BTreeMap::from([("MAX_PAGE_SIZE".to_string(), "lots".to_string())]);
        let err = parse_number::<u32>(&mut layered, "MAX_PAGE_SIZE").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value 'lots' for DIRECTORY_MAX_PAGE_SIZE"
        );
    }
}
