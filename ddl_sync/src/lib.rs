//! ddl_sync: declarative PostgreSQL schema migrations from Rust structs
//!
//! Models declared with `#[derive(Model)]` and `#[derive(DbEnum)]` describe the
//! desired schema. ddl_sync observes the live database, diffs the two into an
//! ordered list of actions, compiles them to SQL, records the statements as a
//! migration unit and applies pending units exactly once, each in its own
//! transaction.

// Lets derive output name `::ddl_sync` from inside this crate
extern crate self as ddl_sync;

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::DatabaseConnection;
pub use db::migrations::{MigrationReport, MigrationStatus};
pub use db::units::{MigrationDirectory, MigrationUnit};
pub use ddl_sync_macros::{DbEnum, Model};
pub use error::{Error, Result};
pub use models::registry::{ModelRegistry, SchemaProvider};
pub use schema::analyzer::{SchemaAnalyzer, SchemaObserver};
pub use schema::diff::SchemaDiff;
pub use schema::types::Schema;

/// Initialize ddl_sync with the specified configuration file
pub async fn init(config_path: &str) -> Result<SyncClient> {
    let config = config::load_from_file(config_path)?;
    SyncClient::new(config).await
}

/// The main client for interacting with ddl_sync
pub struct SyncClient {
    config: Config,
    db_connection: DatabaseConnection,
    model_registry: ModelRegistry,
    schema_analyzer: SchemaAnalyzer,
    migrations: MigrationDirectory,
}

impl SyncClient {
    /// Create a new client from configuration
    pub async fn new(config: Config) -> Result<Self> {
        let db_connection = DatabaseConnection::connect(&config.database).await?;
        let model_registry = ModelRegistry::new(&config);
        let schema_analyzer =
            SchemaAnalyzer::new(db_connection.clone(), &config.migrations.ledger_table);
        let migrations = MigrationDirectory::new(&config.migrations.directory);

        Ok(Self {
            config,
            db_connection,
            model_registry,
            schema_analyzer,
            migrations,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registry for models registered in code with `register::<T>()`
    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.model_registry
    }

    pub fn migration_directory(&self) -> &MigrationDirectory {
        &self.migrations
    }

    /// Scan the configured directories for model definitions and register them
    pub fn register_models(&mut self) -> Result<()> {
        self.model_registry.scan_and_register()
    }

    pub fn desired_schema(&self) -> Result<Schema> {
        self.model_registry.desired_schema()
    }

    pub async fn observed_schema(&self) -> Result<Schema> {
        self.schema_analyzer.observe().await
    }

    /// Diff registered models against the database
    pub async fn generate_schema_diff(&self) -> Result<SchemaDiff> {
        let desired = self.desired_schema()?;
        if desired.is_empty() {
            tracing::warn!("No models registered, every managed table will be dropped");
        }
        let observed = self.observed_schema().await?;

        Ok(SchemaDiff::generate(&desired, &observed))
    }

    /// Apply every unit in the migration directory not yet in the ledger
    pub async fn apply_migrations(&self) -> Result<MigrationReport> {
        let units = self.migrations.load_units()?;
        let mut session = self.db_connection.session().await?;

        db::migrations::run_migrations(&mut session, units, &self.config.migrations.ledger_table)
            .await
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        let units = self.migrations.load_units()?;
        let mut session = self.db_connection.session().await?;

        db::migrations::migration_status(&mut session, units, &self.config.migrations.ledger_table)
            .await
    }

    /// Bring the database up to date, then record and apply a unit for any
    /// remaining difference. Returns the new unit, if one was written.
    pub async fn migrate_dev(&self, description: &str) -> Result<Option<MigrationUnit>> {
        self.apply_migrations().await?;

        let diff = self.generate_schema_diff().await?;
        if diff.is_empty() {
            tracing::info!("Database schema is already in sync with models");
            return Ok(None);
        }

        let statements = diff.to_sql()?;
        for statement in &statements {
            tracing::info!(sql = %statement, "Pending migration statement");
        }

        let unit = self.migrations.write_unit(description, statements)?;
        self.apply_migrations().await?;

        Ok(Some(unit))
    }

    pub async fn close(&self) {
        self.db_connection.close().await;
    }
}
