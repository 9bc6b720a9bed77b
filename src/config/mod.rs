//! Configuration management
//!
//! This module handles loading and parsing configuration for Manuscript.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use crate::models::{Permission, Role, RolePolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Tag relevance engine configuration
    #[serde(default)]
    pub relevance: RelevanceConfig,
    /// Role table
    #[serde(default = "default_roles")]
    pub roles: Vec<RoleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            relevance: RelevanceConfig::default(),
            roles: default_roles(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or URL (`:memory:` for an in-memory database)
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/manuscript.db".to_string()
}

/// Longest accepted refresh interval, one day
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;

/// Longest accepted trending window, ten years
pub const MAX_TRENDING_WINDOW_HOURS: u64 = 87_600;

/// Tag relevance engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Period of the background full recompute, in seconds
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Deadline of each repository call made by the engine, in seconds.
    /// Must be shorter than the refresh interval.
    #[serde(default = "default_recompute_timeout_secs")]
    pub recompute_timeout_secs: u64,
    /// Lookback window of the trending score, in hours
    #[serde(default = "default_trending_window_hours")]
    pub trending_window_hours: u64,
    /// Maximum tags of one version taken into pair counting
    #[serde(default = "default_max_tags_per_version")]
    pub max_tags_per_version: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            recompute_timeout_secs: default_recompute_timeout_secs(),
            trending_window_hours: default_trending_window_hours(),
            max_tags_per_version: default_max_tags_per_version(),
        }
    }
}

impl RelevanceConfig {
    /// Refresh period, clamped to `1..=MAX_REFRESH_INTERVAL_SECS`
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.clamp(1, MAX_REFRESH_INTERVAL_SECS))
    }

    pub fn recompute_timeout(&self) -> Duration {
        Duration::from_secs(self.recompute_timeout_secs)
    }

    /// Trending window, clamped to `MAX_TRENDING_WINDOW_HOURS`
    pub fn trending_window(&self) -> chrono::Duration {
        let hours = self.trending_window_hours.min(MAX_TRENDING_WINDOW_HOURS);
        chrono::Duration::hours(hours as i64)
    }
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_recompute_timeout_secs() -> u64 {
    8
}

fn default_trending_window_hours() -> u64 {
    24
}

fn default_max_tags_per_version() -> usize {
    64
}

/// Role entry of the role table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

fn default_roles() -> Vec<RoleConfig> {
    vec![
        RoleConfig {
            name: "ContentWriter".to_string(),
            permissions: vec![
                Permission::ReadDraftedArticle,
                Permission::ReadArchivedArticle,
                Permission::CreateArticle,
            ],
        },
        RoleConfig {
            name: "Editor".to_string(),
            permissions: vec![
                Permission::ReadDraftedArticle,
                Permission::ReadArchivedArticle,
                Permission::CreateArticle,
                Permission::DeleteArticle,
                Permission::UpdateStatusArticle,
            ],
        },
    ]
}

impl RolePolicy {
    /// Build the role table from configuration
    pub fn from_config(roles: &[RoleConfig]) -> Self {
        RolePolicy::new(
            roles
                .iter()
                .map(|r| Role::new(r.name.clone(), r.permissions.iter().copied())),
        )
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        // Handle empty file - return defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides,
    /// then validate it.
    ///
    /// Environment variables follow the pattern:
    /// - MANUSCRIPT_DATABASE_URL
    /// - MANUSCRIPT_RELEVANCE_REFRESH_INTERVAL_SECS
    /// - MANUSCRIPT_RELEVANCE_RECOMPUTE_TIMEOUT_SECS
    /// - MANUSCRIPT_RELEVANCE_TRENDING_WINDOW_HOURS
    /// - MANUSCRIPT_RELEVANCE_MAX_TAGS_PER_VERSION
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let relevance = &self.relevance;
        if relevance.refresh_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "relevance.refresh_interval_secs must be greater than 0".to_string(),
            ));
        }
        if relevance.refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS {
            return Err(ConfigError::ValidationError(format!(
                "relevance.refresh_interval_secs must be at most {}",
                MAX_REFRESH_INTERVAL_SECS
            )));
        }
        if relevance.recompute_timeout_secs >= relevance.refresh_interval_secs {
            return Err(ConfigError::ValidationError(format!(
                "relevance.recompute_timeout_secs ({}) must be shorter than relevance.refresh_interval_secs ({})",
                relevance.recompute_timeout_secs, relevance.refresh_interval_secs
            )));
        }
        if relevance.trending_window_hours == 0 {
            return Err(ConfigError::ValidationError(
                "relevance.trending_window_hours must be greater than 0".to_string(),
            ));
        }
        if relevance.trending_window_hours > MAX_TRENDING_WINDOW_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "relevance.trending_window_hours must be at most {}",
                MAX_TRENDING_WINDOW_HOURS
            )));
        }
        if relevance.max_tags_per_version < 2 {
            return Err(ConfigError::ValidationError(
                "relevance.max_tags_per_version must be at least 2".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for role in &self.roles {
            if !names.insert(role.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate role name: {}",
                    role.name
                )));
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("MANUSCRIPT_DATABASE_URL") {
            self.database.url = url;
        }

        // Invalid numbers are ignored
        if let Some(v) = env_number("MANUSCRIPT_RELEVANCE_REFRESH_INTERVAL_SECS") {
            self.relevance.refresh_interval_secs = v;
        }
        if let Some(v) = env_number("MANUSCRIPT_RELEVANCE_RECOMPUTE_TIMEOUT_SECS") {
            self.relevance.recompute_timeout_secs = v;
        }
        if let Some(v) = env_number("MANUSCRIPT_RELEVANCE_TRENDING_WINDOW_HOURS") {
            self.relevance.trending_window_hours = v;
        }
        if let Some(v) = env_number("MANUSCRIPT_RELEVANCE_MAX_TAGS_PER_VERSION") {
            self.relevance.max_tags_per_version = v;
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
