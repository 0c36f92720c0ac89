//! SQL execution abstraction
//!
//! The migration runner only needs to execute statements, read and
//! append ledger rows, and scope work in a transaction. These traits are
//! that seam; [`crate::db::connection::PgSession`] implements them for
//! PostgreSQL.

use async_trait::async_trait;

use crate::error::Result;

/// A single database connection the runner can drive
#[async_trait]
pub trait SqlConnection: Send {
    /// Execute one statement outside of any explicit transaction
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Names of every unit recorded in the ledger table
    async fn applied_migrations(&mut self, ledger_table: &str) -> Result<Vec<String>>;

    /// Open a transaction on this connection
    async fn begin<'c>(&'c mut self) -> Result<Box<dyn SqlTransaction + 'c>>;
}

/// An open transaction. Dropping it without committing rolls it back.
#[async_trait]
pub trait SqlTransaction: Send {
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Append a ledger row for `name`
    async fn record_migration(&mut self, ledger_table: &str, name: &str) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Ledger DDL. The primary key keeps concurrent runners from recording a
/// unit twice.
pub fn ledger_table_sql(ledger_table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (name TEXT PRIMARY KEY, ran_at TIMESTAMPTZ(3) NOT NULL DEFAULT NOW())",
        ledger_table
    )
}
