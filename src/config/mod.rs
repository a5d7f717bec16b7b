//! Configuration loading for the activity ingester.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `ACTIVITY_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::TrackedProject;

/// Upper bound GitHub accepts for `per_page`.
pub const MAX_EVENTS_PER_PAGE: u32 = 100;

/// Application configuration derived from `ACTIVITY_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repo: Option<String>,
    #[serde(default = "default_project_id")]
    pub project_id: i64,
    /// Stop issuing upstream calls once the reported budget is at or below this value.
    #[serde(default = "default_rate_limit_floor")]
    pub rate_limit_floor: u32,
    #[serde(default = "default_events_per_page")]
    pub events_per_page: u32,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            github_api_base: None,
            github_token: None,
            github_owner: None,
            github_repo: None,
            project_id: default_project_id(),
            rate_limit_floor: default_rate_limit_floor(),
            events_per_page: default_events_per_page(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

impl AppConfig {
    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.github_token.is_some() {
            config.github_token = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Upstream coordinates and local id of the project being ingested.
    pub fn tracked_project(&self) -> Result<TrackedProject, ConfigError> {
        let owner = self
            .github_owner
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingGitHubOwner)?;
        let repo = self
            .github_repo
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingGitHubRepo)?;

        Ok(TrackedProject {
            project_id: self.project_id,
            owner,
            repo,
        })
    }

    /// Validates the configuration, returning an error if settings are out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events_per_page == 0 || self.events_per_page > MAX_EVENTS_PER_PAGE {
            return Err(ConfigError::InvalidEventsPerPage {
                value: self.events_per_page,
            });
        }

        if self.http_timeout_seconds == 0 {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_seconds,
            });
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidDbMaxConnections {
                value: self.db_max_connections,
            });
        }

        // Upstream coordinates are only mandatory outside local/test
        if !matches!(self.profile.as_str(), "local" | "test") {
            self.tracked_project()?;
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

fn default_database_url() -> String {
    "postgresql://localhost:5432/tracker".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_project_id() -> i64 {
    1
}

fn default_rate_limit_floor() -> u32 {
    10
}

fn default_events_per_page() -> u32 {
    MAX_EVENTS_PER_PAGE
}

fn default_http_timeout_seconds() -> u64 {
    30
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
    InvalidValue { key: String, value: String },
    #[error("GitHub owner is missing; set ACTIVITY_GITHUB_OWNER")]
    MissingGitHubOwner,
    #[error("GitHub repository is missing; set ACTIVITY_GITHUB_REPO")]
    MissingGitHubRepo,
    #[error("events per page must be between 1 and 100, got {value}")]
    InvalidEventsPerPage { value: u32 },
    #[error("HTTP timeout must be positive, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("database max connections must be positive, got {value}")]
    InvalidDbMaxConnections { value: u32 },
}

/// Loads configuration using layered `.env` files and `ACTIVITY_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
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

    /// Loads `.env`, `.env.local`, `.env.{profile}`, `.env.{profile}.local`, then the process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("ACTIVITY_") {
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
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let github_api_base = non_empty(layered.remove("GITHUB_API_BASE"));
        let github_token = non_empty(layered.remove("GITHUB_TOKEN"));
        let github_owner = non_empty(layered.remove("GITHUB_OWNER"));
        let github_repo = non_empty(layered.remove("GITHUB_REPO"));

        // Numeric settings that shape the run must parse; a typo should not silently fall back.
        let project_id = parse_or(&mut layered, "PROJECT_ID", default_project_id)?;
        let rate_limit_floor = parse_or(&mut layered, "RATE_LIMIT_FLOOR", default_rate_limit_floor)?;
        let events_per_page = parse_or(&mut layered, "EVENTS_PER_PAGE", default_events_per_page)?;
        let http_timeout_seconds =
            parse_or(&mut layered, "HTTP_TIMEOUT_SECONDS", default_http_timeout_seconds)?;

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            github_api_base,
            github_token,
            github_owner,
            github_repo,
            project_id,
            rate_limit_floor,
            events_per_page,
            http_timeout_seconds,
        };

        config.validate()?;

        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("ACTIVITY_PROFILE")
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
                    if let Some(stripped) = key.strip_prefix("ACTIVITY_") {
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

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|val| {
        let trimmed = val.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_or<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
    default: fn() -> T,
) -> Result<T, ConfigError> {
    match layered.remove(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: format!("ACTIVITY_{}", key),
            value: raw,
        }),
        None => Ok(default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_for_local_profile() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.events_per_page, 100);
        assert_eq!(config.rate_limit_floor, 10);
    }

    #[test]
    fn production_profile_requires_upstream_coordinates() {
        let config = AppConfig {
            profile: "production".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingGitHubOwner)
        ));

        let config = AppConfig {
            profile: "production".to_string(),
            github_owner: Some("joomla".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingGitHubRepo)
        ));
    }

    #[test]
    fn page_size_is_bounded() {
        let config = AppConfig {
            events_per_page: 101,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEventsPerPage { value: 101 })
        ));
    }

    #[test]
    fn redacted_json_hides_token() {
        let config = AppConfig {
            github_token: Some("ghp_secret".to_string()),
            ..Default::default()
        };
        let json = config.redacted_json().unwrap();
        assert!(!json.contains("ghp_secret"));
        assert!(json.contains("[REDACTED]"));
    }
}
