//! Action compiler
//!
//! Turns one [`Action`] into exactly one PostgreSQL statement. Constraint
//! names are derived from table and column (`fk_<table>_<column>`,
//! `uq_<table>_<column>`) so a later drop can find what an earlier add
//! created without the name being stored anywhere.

use crate::error::{Error, Result};
use crate::schema::action::{Action, EnumAction, EnumActionKind, TableAction, TableActionKind};
use crate::schema::types::{Column, Constraint, Index, IndexKind};
use crate::utils::naming::get_constraint_name;

/// Compile a single action to SQL
pub fn compile(action: &Action) -> Result<String> {
    match action {
        Action::Table(action) => compile_table_action(action),
        Action::Enum(action) => compile_enum_action(action),
    }
}

/// Compile a list of actions, preserving order
pub fn compile_all(actions: &[Action]) -> Result<Vec<String>> {
    actions.iter().map(compile).collect()
}

/// Column fragment used by `CREATE TABLE` and `ADD COLUMN`
pub fn column_definition(column: &Column) -> String {
    let mut sql = column.name.clone();

    if column.auto_increment {
        sql.push(' ');
        sql.push_str(serial_keyword(&column.data_type));
    } else {
        sql.push(' ');
        sql.push_str(&column.data_type);
    }

    if !column.nullable && !column.primary_key {
        sql.push_str(" NOT NULL");
    }

    if column.primary_key {
        sql.push_str(" PRIMARY KEY");
    }

    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }

    sql
}

fn compile_table_action(action: &TableAction) -> Result<String> {
    let table = &action.table.name;

    let sql = match action.kind {
        TableActionKind::CreateTable => {
            let columns: Vec<String> = action.table.columns.iter().map(column_definition).collect();
            format!("CREATE TABLE {} ({})", table, columns.join(", "))
        }
        TableActionKind::DropTable => format!("DROP TABLE {}", table),
        TableActionKind::CreateIndex => {
            let index = require_index(action)?;
            let unique = if index.kind == IndexKind::Unique { " UNIQUE" } else { "" };
            format!(
                "CREATE{} INDEX {} ON {} ({})",
                unique,
                index.name,
                table,
                index.columns.join(",")
            )
        }
        TableActionKind::DropIndex => format!("DROP INDEX {}", require_index(action)?.name),
        TableActionKind::CreateColumn => format!(
            "ALTER TABLE {} ADD COLUMN {}",
            table,
            column_definition(require_column(action)?)
        ),
        TableActionKind::DropColumn => format!(
            "ALTER TABLE {} DROP COLUMN {}",
            table,
            require_column(action)?.name
        ),
        TableActionKind::ChangeDataType => {
            let column = require_column(action)?;
            let mut sql = format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                table,
                column.name,
                storage_type(&column.data_type)
            );
            if column.data_type == "uuid" {
                sql.push_str(&format!(" USING {}::uuid", column.name));
            }
            sql
        }
        TableActionKind::SetNullable => format!(
            "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL",
            table,
            require_column(action)?.name
        ),
        TableActionKind::SetNotNullable => format!(
            "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
            table,
            require_column(action)?.name
        ),
        TableActionKind::SetDefault => {
            let column = require_column(action)?;
            match &column.default {
                Some(default) => format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                    table, column.name, default
                ),
                None => format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT", table, column.name),
            }
        }
        TableActionKind::AddConstraint => {
            let column = require_column(action)?;
            let constraint = require_constraint(action)?;
            let name = get_constraint_name(constraint.kind(), table, &column.name);
            match constraint {
                Constraint::ForeignKey { references, on_delete } => {
                    let mut sql = format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}",
                        table, name, column.name, references
                    );
                    if let Some(on_delete) = on_delete {
                        sql.push_str(&format!(" ON DELETE {}", on_delete));
                    }
                    sql
                }
                Constraint::Unique => format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                    table, name, column.name
                ),
            }
        }
        TableActionKind::DropConstraint => {
            let column = require_column(action)?;
            let constraint = require_constraint(action)?;
            format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                table,
                get_constraint_name(constraint.kind(), table, &column.name)
            )
        }
    };

    Ok(sql)
}

fn compile_enum_action(action: &EnumAction) -> Result<String> {
    let name = &action.enum_type.name;

    let sql = match action.kind {
        EnumActionKind::CreateEnum => {
            let values: Vec<String> = action
                .enum_type
                .values
                .iter()
                .map(|v| quote_literal(v))
                .collect();
            format!("CREATE TYPE {} AS ENUM ({})", name, values.join(", "))
        }
        EnumActionKind::DropEnum => format!("DROP TYPE {}", name),
        EnumActionKind::AddEnumValue => {
            let value = action.value.as_deref().ok_or_else(|| {
                Error::InvalidAction(format!("AddEnumValue on {} has no value", name))
            })?;
            format!("ALTER TYPE {} ADD VALUE {}", name, quote_literal(value))
        }
    };

    Ok(sql)
}

/// Sequence-backed pseudo-type for an auto-increment column
fn serial_keyword(data_type: &str) -> &'static str {
    match data_type {
        "bigserial" | "int8" => "BIGSERIAL",
        "smallserial" | "int2" => "SMALLSERIAL",
        _ => "SERIAL",
    }
}

/// `serial` types only exist in column declarations; `ALTER ... TYPE` needs the integer underneath
fn storage_type(data_type: &str) -> &str {
    match data_type {
        "serial" => "int4",
        "bigserial" => "int8",
        "smallserial" => "int2",
        other => other,
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn require_index(action: &TableAction) -> Result<&Index> {
    action.index.as_ref().ok_or_else(|| missing(action, "index"))
}

fn require_column(action: &TableAction) -> Result<&Column> {
    action.column.as_ref().ok_or_else(|| missing(action, "column"))
}

fn require_constraint(action: &TableAction) -> Result<&Constraint> {
    action.constraint.as_ref().ok_or_else(|| missing(action, "constraint"))
}

fn missing(action: &TableAction, field: &str) -> Error {
    Error::InvalidAction(format!(
        "{:?} on table {} has no {}",
        action.kind, action.table.name, field
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::Table;
    use rstest::rstest;

    #[test]
    fn test_column_definition_variants() {
        assert_eq!(
            column_definition(&Column::new("id", "int4").primary_key().auto_increment()),
            "id SERIAL PRIMARY KEY"
        );
        assert_eq!(
            column_definition(&Column::new("id", "bigserial").primary_key().auto_increment()),
            "id BIGSERIAL PRIMARY KEY"
        );
        assert_eq!(column_definition(&Column::new("email", "text")), "email text NOT NULL");
        assert_eq!(column_definition(&Column::new("bio", "text").nullable(true)), "bio text");
        assert_eq!(
            column_definition(&Column::new("created_at", "timestamptz(3)").default("NOW()")),
            "created_at timestamptz(3) NOT NULL DEFAULT NOW()"
        );
    }

    #[test]
    fn test_enum_values_are_escaped() {
        let action = EnumAction::new(
            EnumActionKind::AddEnumValue,
            &crate::schema::types::EnumType::new("mood", &[]),
        )
        .with_value("it's");
        assert_eq!(
            compile(&action.into()).unwrap(),
            "ALTER TYPE mood ADD VALUE 'it''s'"
        );
    }

    #[rstest]
    #[case("serial", "int4")]
    #[case("bigserial", "int8")]
    #[case("smallserial", "int2")]
    #[case("numeric", "numeric")]
    fn test_type_change_uses_storage_type(#[case] desired: &str, #[case] rendered: &str) {
        let table = Table::new("thing");
        let action = TableAction::new(TableActionKind::ChangeDataType, &table)
            .with_column(&Column::new("id", desired).primary_key().auto_increment());
        assert_eq!(
            compile(&action.into()).unwrap(),
            format!("ALTER TABLE thing ALTER COLUMN id TYPE {}", rendered)
        );
    }

    #[test]
    fn test_missing_constraint_is_invalid() {
        let table = Table::new("users");
        let action = TableAction::new(TableActionKind::AddConstraint, &table)
            .with_column(&Column::new("email", "text"));
        let err = compile(&action.into()).unwrap_err();
        assert!(matches!(err, Error::InvalidAction(_)));
    }
}
