//! Error types for ddl_sync

use thiserror::Error;

/// Result type for ddl_sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ddl_sync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Schema analysis error: {0}")]
    SchemaAnalysisError(String),

    /// An action reached the compiler without a field its kind requires
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// The migration ledger could not be created or read
    #[error("Migration ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// A unit's transaction failed and was rolled back
    #[error("Migration {unit} failed: {reason}")]
    MigrationFailed { unit: String, reason: String },

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Model registration error: {0}")]
    ModelRegistrationError(String),

    #[error("Type mapping error: {0}")]
    TypeMappingError(String),

    #[error("Syntax error: {0}")]
    SyntaxError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

/// Convert Serde JSON errors to ddl_sync errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to ddl_sync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(error: toml::ser::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}
