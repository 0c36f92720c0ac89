//! Database module for ddl_sync
//!
//! Connections, the execution seam used by the runner, migration units
//! and the runner itself.

pub mod connection;
pub mod executor;
pub mod migrations;
pub mod units;

pub use connection::{DatabaseConnection, PgSession};
pub use executor::{SqlConnection, SqlTransaction};
pub use migrations::{migration_status, run_migrations, MigrationReport, MigrationStatus};
pub use units::{MigrationDirectory, MigrationUnit};
