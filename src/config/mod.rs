//! Configuration management
//!
//! This module handles loading and parsing configuration for the Foodgram service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Recipe image storage
    #[serde(default)]
    pub upload: UploadConfig,
    /// Limit/offset pagination defaults
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Auth token lifetime
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin of the web frontend
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Upper bound for pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/foodgram.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Upload configuration for recipe images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory images are written to (also served as static files)
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Public URL prefix the upload directory is mounted at
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    /// Maximum decoded image size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            url_prefix: default_url_prefix(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_url_prefix() -> String {
    "/media".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }

    /// Public URL of a stored image path (relative to `path`)
    pub fn public_url(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.url_prefix.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

/// Limit/offset pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when the request has no `limit`
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    /// Largest `limit` a client may ask for
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> i64 {
    6
}

fn default_max_limit() -> i64 {
    100
}

/// Auth session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Token lifetime in days
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_expiration_days(),
        }
    }
}

fn default_expiration_days() -> i64 {
    7
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

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - FOODGRAM_SERVER_HOST
    /// - FOODGRAM_SERVER_PORT
    /// - FOODGRAM_SERVER_CORS_ORIGIN
    /// - FOODGRAM_DATABASE_DRIVER
    /// - FOODGRAM_DATABASE_URL
    /// - FOODGRAM_DATABASE_MAX_CONNECTIONS
    /// - FOODGRAM_UPLOAD_PATH
    /// - FOODGRAM_UPLOAD_URL_PREFIX
    /// - FOODGRAM_PAGINATION_DEFAULT_LIMIT
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the service misbehave at runtime
    fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.default_limit < 1 {
            return Err(ConfigError::ValidationError(
                "pagination.default_limit must be at least 1".to_string(),
            ));
        }
        if self.pagination.max_limit < self.pagination.default_limit {
            return Err(ConfigError::ValidationError(
                "pagination.max_limit must not be below pagination.default_limit".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `FOODGRAM_*` environment overrides; unparsable values are ignored
    fn apply_env_overrides(&mut self) {
        if let Some(host) = env_value("FOODGRAM_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_value("FOODGRAM_SERVER_PORT") {
            self.server.port = port;
        }
        if let Some(origin) = env_value("FOODGRAM_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Some(driver) = env_value::<String>("FOODGRAM_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                other => tracing::warn!("Ignoring unknown database driver '{}'", other),
            }
        }
        if let Some(url) = env_value("FOODGRAM_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = env_value("FOODGRAM_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = max;
        }
        if let Some(path) = env_value("FOODGRAM_UPLOAD_PATH") {
            self.upload.path = path;
        }
        if let Some(prefix) = env_value("FOODGRAM_UPLOAD_URL_PREFIX") {
            self.upload.url_prefix = prefix;
        }
        if let Some(limit) = env_value("FOODGRAM_PAGINATION_DEFAULT_LIMIT") {
            self.pagination.default_limit = limit;
        }
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
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
