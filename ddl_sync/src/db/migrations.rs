//! Migration runner
//!
//! Applies every unit not yet recorded in the ledger, in apply order, one
//! transaction per unit. A unit's statements and its ledger row commit
//! together or not at all. The first failure stops the run; units before
//! it stay committed and units after it are not attempted.

use std::collections::HashSet;

use crate::db::executor::{ledger_table_sql, SqlConnection, SqlTransaction};
use crate::db::units::{sort_units, MigrationUnit};
use crate::error::{Error, Result};

/// Outcome of a successful runner invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Units applied by this invocation, in order
    pub applied: Vec<String>,
    /// Units already in the ledger
    pub skipped: Vec<String>,
}

impl MigrationReport {
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Ledger state compared against the available units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: Vec<String>,
    pub pending: Vec<String>,
}

async fn ensure_ledger<C>(conn: &mut C, ledger_table: &str) -> Result<HashSet<String>>
where
    C: SqlConnection + ?Sized,
{
    conn.execute(&ledger_table_sql(ledger_table))
        .await
        .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;

    let applied = conn
        .applied_migrations(ledger_table)
        .await
        .map_err(|e| Error::LedgerUnavailable(e.to_string()))?;

    Ok(applied.into_iter().collect())
}

/// Apply all pending units
pub async fn run_migrations<C>(
    conn: &mut C,
    mut units: Vec<MigrationUnit>,
    ledger_table: &str,
) -> Result<MigrationReport>
where
    C: SqlConnection + ?Sized,
{
    let applied = ensure_ledger(conn, ledger_table).await?;
    sort_units(&mut units);

    let mut report = MigrationReport::default();

    for unit in units {
        if applied.contains(&unit.name) {
            tracing::debug!(unit = %unit.name, "Already applied, skipping");
            report.skipped.push(unit.name);
            continue;
        }

        tracing::info!(unit = %unit.name, statements = unit.statements.len(), "Applying migration");

        apply_unit(conn, &unit, ledger_table)
            .await
            .map_err(|e| {
                tracing::error!(unit = %unit.name, error = %e, "Migration failed, rolled back");
                Error::MigrationFailed {
                    unit: unit.name.clone(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!(unit = %unit.name, "Migration applied");
        report.applied.push(unit.name);
    }

    Ok(report)
}

async fn apply_unit<C>(conn: &mut C, unit: &MigrationUnit, ledger_table: &str) -> Result<()>
where
    C: SqlConnection + ?Sized,
{
    let mut tx = conn.begin().await?;

    match execute_unit(tx.as_mut(), unit, ledger_table).await {
        Ok(()) => tx.commit().await,
        Err(e) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::warn!(unit = %unit.name, error = %rollback_error, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn execute_unit(
    tx: &mut (dyn SqlTransaction + '_),
    unit: &MigrationUnit,
    ledger_table: &str,
) -> Result<()> {
    for statement in &unit.statements {
        if statement.trim().is_empty() {
            continue;
        }
        tracing::debug!(unit = %unit.name, sql = %statement, "Executing");
        tx.execute(statement).await?;
    }

    tx.record_migration(ledger_table, &unit.name).await
}

/// Report which units are applied and which are pending without running any
pub async fn migration_status<C>(
    conn: &mut C,
    mut units: Vec<MigrationUnit>,
    ledger_table: &str,
) -> Result<MigrationStatus>
where
    C: SqlConnection + ?Sized,
{
    let applied = ensure_ledger(conn, ledger_table).await?;
    sort_units(&mut units);

    let mut status = MigrationStatus::default();
    for unit in units {
        if applied.contains(&unit.name) {
            status.applied.push(unit.name);
        } else {
            status.pending.push(unit.name);
        }
    }

    Ok(status)
}
