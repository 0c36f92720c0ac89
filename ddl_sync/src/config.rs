//! Configuration handling for ddl_sync

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Environment variable that overrides `database.url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Default configuration file name looked up by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "ddl_sync.toml";

/// Load configuration from a TOML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config = Config::from_toml_str(&config_str)?;
    Ok(config.with_database_url_override(std::env::var(DATABASE_URL_ENV).ok()))
}

/// Represents the complete ddl_sync configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub type_mapping: TypeMappingConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Build a configuration with defaults for everything but the database URL
    pub fn new(database_url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: database_url.to_string(),
                pool_size: default_pool_size(),
                timeout_seconds: default_timeout_seconds(),
                schema: default_schema(),
            },
            migrations: MigrationsConfig::default(),
            models: ModelsConfig::default(),
            naming: NamingConfig::default(),
            type_mapping: TypeMappingConfig::default(),
            logging: None,
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        toml::from_str(config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Render the configuration back to TOML, used to scaffold new projects
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Replace the database URL when an override is present
    pub fn with_database_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database.url = url;
        }
        self
    }
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Namespace that is observed and reconciled
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_pool_size() -> u32 {
    5
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_schema() -> String {
    "public".to_string()
}

/// Migration settings configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MigrationsConfig {
    #[serde(default = "default_migrations_directory")]
    pub directory: String,
    #[serde(default = "default_ledger_table")]
    pub ledger_table: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_migrations_directory(),
            ledger_table: default_ledger_table(),
        }
    }
}

fn default_migrations_directory() -> String {
    "database/migrations".to_string()
}

fn default_ledger_table() -> String {
    "_ddl_sync_migrations".to_string()
}

/// Model discovery configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelsConfig {
    #[serde(default = "default_model_paths")]
    pub paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default = "default_true")]
    pub recursive_scan: bool,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            paths: default_model_paths(),
            exclude_paths: Vec::new(),
            recursive_scan: true,
        }
    }
}

fn default_model_paths() -> Vec<String> {
    vec!["src/models".to_string()]
}

fn default_true() -> bool {
    true
}

/// Naming conventions configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NamingConfig {
    #[serde(default = "default_table_style")]
    pub table_style: String,
    #[serde(default)]
    pub pluralize_tables: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            table_style: default_table_style(),
            pluralize_tables: false,
        }
    }
}

fn default_table_style() -> String {
    "snake_case".to_string()
}

/// Type mapping configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TypeMappingConfig {
    #[serde(default)]
    pub custom: Vec<CustomTypeMapping>,
}

/// Custom type mapping
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomTypeMapping {
    pub rust_type: String,
    pub db_type: String,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub stdout: bool,
}

fn default_log_format() -> String {
    "text".to_string()
}
