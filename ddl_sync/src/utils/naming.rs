//! Naming utilities for ddl_sync
//!
//! Table, index, constraint and migration file naming. Index and
//! constraint names are deterministic; the observer relies on the index
//! prefix and the compiler on the constraint pattern.

use chrono::{DateTime, Utc};
use inflector::Inflector;

use crate::schema::types::{ConstraintKind, IndexKind};

/// Prefix of every index this crate manages
pub const INDEX_PREFIX: &str = "idx_";

/// Apply a naming convention to a string
pub fn apply_naming_convention(name: &str, convention: &str) -> String {
    match convention {
        "snake_case" => name.to_snake_case(),
        "camel_case" => name.to_camel_case(),
        "pascal_case" => name.to_pascal_case(),
        "kebab_case" => name.to_kebab_case(),
        "screaming_snake_case" => name.to_screaming_snake_case(),
        _ => name.to_string(),
    }
}

/// Get table name from a model name according to convention
pub fn get_table_name(model_name: &str, style: &str, pluralize: bool) -> String {
    let name = apply_naming_convention(model_name, style);

    if pluralize {
        name.to_plural()
    } else {
        name
    }
}

/// `idx_<table>_<index|unique>_<col1>_<col2>...`
pub fn get_index_name(table_name: &str, kind: IndexKind, columns: &[String]) -> String {
    format!(
        "{}{}_{}_{}",
        INDEX_PREFIX,
        table_name,
        kind.label(),
        columns.join("_")
    )
}

/// Whether an observed index follows the managed naming scheme
pub fn is_managed_index(index_name: &str) -> bool {
    index_name.starts_with(INDEX_PREFIX)
}

/// `fk_<table>_<column>` or `uq_<table>_<column>`
pub fn get_constraint_name(kind: ConstraintKind, table_name: &str, column_name: &str) -> String {
    format!("{}_{}_{}", kind.name_prefix(), table_name, column_name)
}

/// Format a free-text description as a safe file name fragment
pub fn format_file_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    sanitized.to_lowercase()
}

/// `<unix millis>_<description>`, which sorts in creation order
pub fn create_migration_name(description: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}",
        created_at.timestamp_millis(),
        format_file_name(description)
    )
}

/// Quote a SQL identifier for statements built outside the compiler
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
