//! Database connection handling
//!
//! A pooled PostgreSQL handle for introspection and ad-hoc statements,
//! plus [`PgSession`], one pinned connection that implements the
//! runner's [`SqlConnection`] seam.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool, Postgres, Transaction};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::db::executor::{SqlConnection, SqlTransaction};
use crate::error::{Error, Result};
use crate::utils::naming::quote_identifier;

/// Pooled connection to the target database
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
    schema: String,
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size.max(1))
            .acquire_timeout(Duration::from_secs(config.timeout_seconds))
            .connect(&config.url)
            .await?;

        tracing::debug!(schema = %config.schema, "Connected to database");

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Namespace being observed and reconciled
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Execute a SQL statement on any pooled connection
    pub async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Check out a single connection for the migration runner
    pub async fn session(&self) -> Result<PgSession> {
        let conn = self.pool.acquire().await?;
        Ok(PgSession { conn })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// One pooled connection held for the duration of a runner invocation
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl SqlConnection for PgSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&mut *self.conn).await?;
        Ok(())
    }

    async fn applied_migrations(&mut self, ledger_table: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT name FROM {} ORDER BY name", ledger_table);
        let names: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut *self.conn).await?;
        Ok(names)
    }

    async fn begin<'c>(&'c mut self) -> Result<Box<dyn SqlTransaction + 'c>> {
        let tx = self.conn.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// A sqlx transaction behind the [`SqlTransaction`] seam
pub struct PgTransaction<'c> {
    tx: Transaction<'c, Postgres>,
}

#[async_trait]
impl<'c> SqlTransaction for PgTransaction<'c> {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn record_migration(&mut self, ledger_table: &str, name: &str) -> Result<()> {
        let sql = format!("INSERT INTO {} (name) VALUES ($1)", ledger_table);
        sqlx::query(&sql).bind(name).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let PgTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

/// Split a connection URL into a maintenance-database URL and the name of
/// the database it points at
pub fn split_database_url(url: &str) -> Result<(String, String)> {
    let invalid = || Error::ConfigError(format!("Database URL has no database name: {}", url));

    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };

    let host_start = base.find("://").ok_or_else(invalid)? + 3;
    let path_start = base[host_start..]
        .find('/')
        .map(|i| i + host_start)
        .ok_or_else(invalid)?;

    let database = &base[path_start + 1..];
    if database.is_empty() {
        return Err(invalid());
    }

    let mut admin_url = format!("{}/postgres", &base[..path_start]);
    if let Some(query) = query {
        admin_url.push('?');
        admin_url.push_str(query);
    }

    Ok((admin_url, database.to_string()))
}

/// Drop and recreate the database named in `url`
pub async fn reset_database(url: &str) -> Result<()> {
    let (admin_url, database) = split_database_url(url)?;
    let mut conn = PgConnection::connect(&admin_url).await?;

    tracing::warn!(database = %database, "Dropping and recreating database");

    let name = quote_identifier(&database);
    sqlx::query(&format!("DROP DATABASE IF EXISTS {}", name))
        .execute(&mut conn)
        .await?;
    sqlx::query(&format!("CREATE DATABASE {}", name))
        .execute(&mut conn)
        .await?;

    conn.close().await?;
    Ok(())
}
