//! Database schema analyzer
//!
//! Reads the live schema of one PostgreSQL namespace into the same
//! [`Schema`] shape the model registry produces, so the two can be diffed.

use async_trait::async_trait;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::FromRow;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::types::{Column, Constraint, EnumType, Index, IndexKind, Schema, Table};
use crate::utils::naming::is_managed_index;

static INDEX_TRAILER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" (WHERE|INCLUDE|WITH) .+$").unwrap());
static INDEX_COLUMNS: Lazy<Regex> = Lazy::new(|| Regex::new(r".*\((.*)\)").unwrap());
/// `'draft'::text`, `'a'::character varying`, `'{}'::jsonb`
static DEFAULT_CAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(.+?)::[A-Za-z_][A-Za-z0-9_ ."]*(\(\d+(,\s*\d+)?\))?(\[\])?$"#).unwrap()
});

/// Anything that can report the current schema
#[async_trait]
pub trait SchemaObserver {
    async fn observe(&self) -> Result<Schema>;
}

/// Schema analyzer for PostgreSQL introspection
pub struct SchemaAnalyzer {
    connection: DatabaseConnection,
    ledger_table: String,
}

#[derive(FromRow)]
struct TableRow {
    table_name: String,
}

#[derive(Debug, Clone, FromRow)]
struct ColumnRow {
    column_name: String,
    udt_name: String,
    datetime_precision: Option<i32>,
    character_maximum_length: Option<i32>,
    is_nullable: String,
    column_default: Option<String>,
}

#[derive(FromRow)]
struct KeyRow {
    constraint_name: String,
    constraint_type: String,
    column_name: String,
}

#[derive(FromRow)]
struct ForeignKeyRow {
    constraint_name: String,
    column_name: String,
    ref_table: String,
    ref_column: String,
    delete_rule: String,
}

#[derive(FromRow)]
struct IndexRow {
    index_name: String,
    is_unique: bool,
    definition: String,
}

#[derive(FromRow)]
struct EnumRow {
    enum_name: String,
    enum_value: String,
}

impl SchemaAnalyzer {
    /// Create a new schema analyzer; the ledger table is never reported
    pub fn new(connection: DatabaseConnection, ledger_table: &str) -> Self {
        Self {
            connection,
            ledger_table: ledger_table.to_string(),
        }
    }

    /// Analyze the current database schema
    pub async fn analyze(&self) -> Result<Schema> {
        let namespace = self.connection.schema();
        let mut schema = Schema::new();

        for enum_type in self.analyze_enums(namespace).await? {
            schema.add_enum(enum_type);
        }

        let sql = r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = $1
              AND table_type = 'BASE TABLE'
              AND table_name <> $2
            ORDER BY table_name
        "#;

        let table_rows = sqlx::query_as::<_, TableRow>(sql)
            .bind(namespace)
            .bind(&self.ledger_table)
            .fetch_all(self.connection.pool())
            .await
            .map_err(analysis_error)?;

        for row in table_rows {
            let table = self.analyze_table(namespace, &row.table_name).await?;
            schema.add_table(table);
        }

        tracing::debug!(
            tables = schema.tables.len(),
            enums = schema.enums.len(),
            "Observed database schema"
        );

        Ok(schema)
    }

    async fn analyze_table(&self, namespace: &str, table_name: &str) -> Result<Table> {
        let pool = self.connection.pool();
        let mut table = Table::new(table_name);

        let sql = r#"
            SELECT
                column_name::text AS column_name,
                udt_name::text AS udt_name,
                datetime_precision::int4 AS datetime_precision,
                character_maximum_length::int4 AS character_maximum_length,
                is_nullable::text AS is_nullable,
                column_default::text AS column_default
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let column_rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(namespace)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(analysis_error)?;

        for row in column_rows {
            table.add_column(column_from_row(row));
        }

        // Foreign keys first so each column lists ForeignKey before Unique
        let sql = r#"
            SELECT
                tc.constraint_name::text AS constraint_name,
                kcu.column_name::text AS column_name,
                ccu.table_name::text AS ref_table,
                ccu.column_name::text AS ref_column,
                rc.delete_rule::text AS delete_rule
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            JOIN information_schema.referential_constraints rc
                ON tc.constraint_name = rc.constraint_name
                AND tc.table_schema = rc.constraint_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND tc.table_schema = $1
              AND tc.table_name = $2
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;

        let fk_rows = sqlx::query_as::<_, ForeignKeyRow>(sql)
            .bind(namespace)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(analysis_error)?;

        let mut seen_foreign_keys = std::collections::HashSet::new();
        for row in fk_rows {
            // Composite keys are not modelled; keep the first column pair
            if !seen_foreign_keys.insert(row.constraint_name.clone()) {
                continue;
            }
            if let Some(column) = table.columns.iter_mut().find(|c| c.name == row.column_name) {
                column.constraints.push(Constraint::ForeignKey {
                    references: format!("{}({})", row.ref_table, row.ref_column),
                    on_delete: delete_action(&row.delete_rule),
                });
            }
        }

        let sql = r#"
            SELECT
                tc.constraint_name::text AS constraint_name,
                tc.constraint_type::text AS constraint_type,
                kcu.column_name::text AS column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
              AND tc.table_schema = $1
              AND tc.table_name = $2
            ORDER BY tc.constraint_name, kcu.ordinal_position
        "#;

        let key_rows = sqlx::query_as::<_, KeyRow>(sql)
            .bind(namespace)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(analysis_error)?;

        let mut keys: IndexMap<String, (String, Vec<String>)> = IndexMap::new();
        for row in key_rows {
            keys.entry(row.constraint_name)
                .or_insert_with(|| (row.constraint_type, Vec::new()))
                .1
                .push(row.column_name);
        }

        for (constraint_type, columns) in keys.values() {
            match (constraint_type.as_str(), columns.as_slice()) {
                ("PRIMARY KEY", _) => {
                    for column in table.columns.iter_mut().filter(|c| columns.contains(&c.name)) {
                        column.primary_key = true;
                    }
                }
                ("UNIQUE", [single]) => {
                    if let Some(column) = table.columns.iter_mut().find(|c| &c.name == single) {
                        if !column.constraints.contains(&Constraint::Unique) {
                            column.constraints.push(Constraint::Unique);
                        }
                    }
                }
                _ => {}
            }
        }

        let sql = r#"
            SELECT
                ix.relname::text AS index_name,
                i.indisunique AS is_unique,
                pg_get_indexdef(i.indexrelid) AS definition
            FROM pg_index i
            JOIN pg_class t ON t.oid = i.indrelid
            JOIN pg_class ix ON ix.oid = i.indexrelid
            JOIN pg_namespace n ON n.oid = t.relnamespace
            WHERE t.relname = $1
              AND n.nspname = $2
            ORDER BY ix.relname
        "#;

        let index_rows = sqlx::query_as::<_, IndexRow>(sql)
            .bind(table_name)
            .bind(namespace)
            .fetch_all(pool)
            .await
            .map_err(analysis_error)?;

        for row in index_rows {
            if !is_managed_index(&row.index_name) {
                continue;
            }
            let kind = if row.is_unique { IndexKind::Unique } else { IndexKind::Plain };
            table.add_index(Index {
                name: row.index_name,
                kind,
                columns: parse_index_columns(&row.definition),
            });
        }

        Ok(table)
    }

    async fn analyze_enums(&self, namespace: &str) -> Result<Vec<EnumType>> {
        let sql = r#"
            SELECT
                t.typname::text AS enum_name,
                e.enumlabel::text AS enum_value
            FROM pg_type t
            JOIN pg_enum e ON t.oid = e.enumtypid
            JOIN pg_namespace n ON n.oid = t.typnamespace
            WHERE n.nspname = $1
            ORDER BY t.typname, e.enumsortorder
        "#;

        let rows = sqlx::query_as::<_, EnumRow>(sql)
            .bind(namespace)
            .fetch_all(self.connection.pool())
            .await
            .map_err(analysis_error)?;

        let mut enums: IndexMap<String, Vec<String>> = IndexMap::new();
        for row in rows {
            enums.entry(row.enum_name).or_default().push(row.enum_value);
        }

        Ok(enums
            .into_iter()
            .map(|(name, values)| EnumType { name, values })
            .collect())
    }
}

#[async_trait]
impl SchemaObserver for SchemaAnalyzer {
    async fn observe(&self) -> Result<Schema> {
        self.analyze().await
    }
}

fn analysis_error(e: sqlx::Error) -> Error {
    Error::SchemaAnalysisError(e.to_string())
}

fn column_from_row(row: ColumnRow) -> Column {
    let auto_increment = row
        .column_default
        .as_deref()
        .map_or(false, |d| d.starts_with("nextval("));

    let data_type = if auto_increment {
        match row.udt_name.as_str() {
            "int8" => "bigserial".to_string(),
            "int2" => "smallserial".to_string(),
            _ => "serial".to_string(),
        }
    } else {
        normalize_data_type(
            &row.udt_name,
            row.datetime_precision,
            row.character_maximum_length,
        )
    };

    Column {
        name: row.column_name,
        data_type,
        nullable: row.is_nullable == "YES",
        primary_key: false,
        auto_increment,
        default: if auto_increment {
            None
        } else {
            row.column_default.as_deref().map(strip_default_cast)
        },
        constraints: Vec::new(),
    }
}

/// Drop the cast PostgreSQL appends to a stored default expression
pub fn strip_default_cast(default: &str) -> String {
    DEFAULT_CAST
        .captures(default)
        .and_then(|caps| caps.get(1))
        .map_or(default, |m| m.as_str())
        .to_string()
}

/// Render a `udt_name` the way column definitions spell it
pub fn normalize_data_type(
    udt_name: &str,
    datetime_precision: Option<i32>,
    char_length: Option<i32>,
) -> String {
    match (udt_name, datetime_precision, char_length) {
        ("timestamptz", Some(precision), _) => format!("timestamptz({})", precision),
        ("varchar", _, Some(length)) => format!("varchar({})", length),
        ("bpchar", _, Some(length)) => format!("char({})", length),
        (other, _, _) => other.to_string(),
    }
}

/// `NO ACTION` is the default and reported as absent
fn delete_action(delete_rule: &str) -> Option<String> {
    match delete_rule {
        "NO ACTION" => None,
        rule => Some(rule.to_string()),
    }
}

/// Column list out of a `pg_get_indexdef` result
pub fn parse_index_columns(definition: &str) -> Vec<String> {
    let trimmed = INDEX_TRAILER.replace(definition, "");
    INDEX_COLUMNS
        .captures(&trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|c| c.trim().trim_matches('"').to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::diff::diff;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("timestamptz", Some(3), None, "timestamptz(3)")]
    #[case("varchar", None, Some(255), "varchar(255)")]
    #[case("bpchar", None, Some(2), "char(2)")]
    #[case("int4", Some(0), None, "int4")]
    #[case("text", None, None, "text")]
    fn test_normalize_data_type(
        #[case] udt: &str,
        #[case] precision: Option<i32>,
        #[case] length: Option<i32>,
        #[case] expected: &str,
    ) {
        assert_eq!(normalize_data_type(udt, precision, length), expected);
    }

    #[rstest]
    #[case("CREATE INDEX idx_users_index_email ON public.users USING btree (email)", vec!["email"])]
    #[case(
        "CREATE UNIQUE INDEX idx_t_unique_a_b ON public.t USING btree (a, b)",
        vec!["a", "b"]
    )]
    #[case(
        "CREATE INDEX idx_t_index_a ON public.t USING btree (a) WHERE (a IS NOT NULL)",
        vec!["a"]
    )]
    #[case(
        "CREATE INDEX idx_t_index_a ON public.t USING btree (\"order\") INCLUDE (b)",
        vec!["order"]
    )]
    fn test_parse_index_columns(#[case] definition: &str, #[case] expected: Vec<&str>) {
        assert_eq!(parse_index_columns(definition), expected);
    }

    fn row(udt: &str, default: Option<&str>) -> ColumnRow {
        ColumnRow {
            column_name: "id".to_string(),
            udt_name: udt.to_string(),
            datetime_precision: None,
            character_maximum_length: None,
            is_nullable: "NO".to_string(),
            column_default: default.map(str::to_string),
        }
    }

    #[test]
    fn test_sequence_default_becomes_serial() {
        let column = column_from_row(row("int4", Some("nextval('users_id_seq'::regclass)")));
        assert_eq!(column.data_type, "serial");
        assert!(column.auto_increment);
        assert_eq!(column.default, None);

        let column = column_from_row(row("int8", Some("nextval('big_id_seq'::regclass)")));
        assert_eq!(column.data_type, "bigserial");
    }

    #[test]
    fn test_plain_default_is_kept() {
        let column = column_from_row(row("bool", Some("false")));
        assert_eq!(column.data_type, "bool");
        assert!(!column.auto_increment);
        assert_eq!(column.default.as_deref(), Some("false"));
        assert!(!column.nullable);
    }

    #[rstest]
    #[case("'x'::text", "'x'")]
    #[case("'x'::character varying", "'x'")]
    #[case("'a'::content_type", "'a'")]
    #[case("'a::b'::text", "'a::b'")]
    #[case("'{}'::jsonb", "'{}'")]
    #[case("'n'::character varying(10)", "'n'")]
    #[case("now()", "now()")]
    #[case("0", "0")]
    fn test_strip_default_cast(#[case] stored: &str, #[case] expected: &str) {
        assert_eq!(strip_default_cast(stored), expected);
    }

    #[test]
    fn test_cast_default_matches_declared_default() {
        let mut status = row("text", Some("'draft'::text"));
        status.column_name = "status".to_string();
        let observed = Schema {
            tables: vec![Table::new("posts").with_column(column_from_row(status))],
            enums: Vec::new(),
        };
        let desired = Schema {
            tables: vec![Table::new("posts").with_column(Column::new("status", "text").default("'draft'"))],
            enums: Vec::new(),
        };

        assert!(diff(&desired, &observed).is_empty());
    }

    #[test]
    fn test_delete_action() {
        assert_eq!(delete_action("NO ACTION"), None);
        assert_eq!(delete_action("CASCADE").as_deref(), Some("CASCADE"));
    }
}
