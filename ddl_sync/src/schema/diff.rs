//! Schema difference calculator
//!
//! Compares a desired schema against an observed one and returns the
//! ordered list of actions that moves the observed schema to the desired
//! one. Order is fixed by phase, then by declaration order inside each
//! phase, since later actions may depend on objects created by earlier
//! ones:
//!
//! 1. enum creation, then enum removal
//! 2. enum value additions
//! 3. table creation, each followed by its indexes and column constraints
//! 4. table removal
//! 5. per matching table: index additions, index removals, column
//!    removals, column additions, column mutations
//!
//! Enum value removal or reordering is not diffed, and renames show up as
//! a drop plus a create.

use crate::error::Result;
use crate::schema::action::{Action, EnumAction, EnumActionKind, TableAction, TableActionKind};
use crate::schema::compiler;
use crate::schema::types::{Column, Schema, Table};

/// Compute the ordered actions needed to turn `observed` into `desired`
pub fn diff(desired: &Schema, observed: &Schema) -> Vec<Action> {
    let mut actions = Vec::new();

    diff_enums(desired, observed, &mut actions);

    for table in &desired.tables {
        if observed.table(&table.name).is_none() {
            create_table(table, &mut actions);
        }
    }

    for table in &observed.tables {
        if desired.table(&table.name).is_none() {
            actions.push(TableAction::new(TableActionKind::DropTable, table).into());
        }
    }

    for table in &desired.tables {
        if let Some(observed_table) = observed.table(&table.name) {
            diff_table(table, observed_table, &mut actions);
        }
    }

    actions
}

fn diff_enums(desired: &Schema, observed: &Schema, actions: &mut Vec<Action>) {
    for enum_type in &desired.enums {
        if observed.enum_type(&enum_type.name).is_none() {
            actions.push(EnumAction::new(EnumActionKind::CreateEnum, enum_type).into());
        }
    }

    for enum_type in &observed.enums {
        if desired.enum_type(&enum_type.name).is_none() {
            actions.push(EnumAction::new(EnumActionKind::DropEnum, enum_type).into());
        }
    }

    for enum_type in &desired.enums {
        let Some(observed_enum) = observed.enum_type(&enum_type.name) else {
            continue;
        };

        for value in &enum_type.values {
            if !observed_enum.values.contains(value) {
                actions.push(
                    EnumAction::new(EnumActionKind::AddEnumValue, observed_enum)
                        .with_value(value)
                        .into(),
                );
            }
        }
    }
}

fn create_table(table: &Table, actions: &mut Vec<Action>) {
    actions.push(TableAction::new(TableActionKind::CreateTable, table).into());

    for index in &table.indexes {
        actions.push(
            TableAction::new(TableActionKind::CreateIndex, table)
                .with_index(index)
                .into(),
        );
    }

    for column in &table.columns {
        add_constraints(table, column, actions);
    }
}

fn add_constraints(table: &Table, column: &Column, actions: &mut Vec<Action>) {
    for constraint in &column.constraints {
        actions.push(
            TableAction::new(TableActionKind::AddConstraint, table)
                .with_column(column)
                .with_constraint(constraint)
                .into(),
        );
    }
}

fn diff_table(desired: &Table, observed: &Table, actions: &mut Vec<Action>) {
    for index in &desired.indexes {
        if !observed.indexes.contains(index) {
            actions.push(
                TableAction::new(TableActionKind::CreateIndex, desired)
                    .with_index(index)
                    .into(),
            );
        }
    }

    for index in &observed.indexes {
        if !desired.indexes.contains(index) {
            actions.push(
                TableAction::new(TableActionKind::DropIndex, observed)
                    .with_index(index)
                    .into(),
            );
        }
    }

    for column in &observed.columns {
        if desired.column(&column.name).is_none() {
            actions.push(
                TableAction::new(TableActionKind::DropColumn, observed)
                    .with_column(column)
                    .into(),
            );
        }
    }

    for column in &desired.columns {
        if observed.column(&column.name).is_none() {
            actions.push(
                TableAction::new(TableActionKind::CreateColumn, desired)
                    .with_column(column)
                    .into(),
            );
            add_constraints(desired, column, actions);
        }
    }

    for column in &desired.columns {
        if let Some(observed_column) = observed.column(&column.name) {
            diff_column(desired, column, observed_column, actions);
        }
    }
}

fn diff_column(table: &Table, desired: &Column, observed: &Column, actions: &mut Vec<Action>) {
    let change = |kind| -> Action { TableAction::new(kind, table).with_column(desired).into() };

    if desired.data_type != observed.data_type {
        actions.push(change(TableActionKind::ChangeDataType));
    }

    if normalized_default(desired) != normalized_default(observed) {
        actions.push(change(TableActionKind::SetDefault));
    }

    match (desired.is_nullable(), observed.is_nullable()) {
        (true, false) => actions.push(change(TableActionKind::SetNullable)),
        (false, true) => actions.push(change(TableActionKind::SetNotNullable)),
        _ => {}
    }

    for constraint in &desired.constraints {
        let present = observed
            .constraints
            .iter()
            .any(|c| c.kind() == constraint.kind());
        if !present {
            actions.push(
                TableAction::new(TableActionKind::AddConstraint, table)
                    .with_column(desired)
                    .with_constraint(constraint)
                    .into(),
            );
        }
    }

    for constraint in &observed.constraints {
        let present = desired
            .constraints
            .iter()
            .any(|c| c.kind() == constraint.kind());
        if !present {
            actions.push(
                TableAction::new(TableActionKind::DropConstraint, table)
                    .with_column(desired)
                    .with_constraint(constraint)
                    .into(),
            );
        }
    }

    // Same tag, different payload: replace, never alter in place.
    for constraint in &desired.constraints {
        let Some(existing) = observed
            .constraints
            .iter()
            .find(|c| c.kind() == constraint.kind())
        else {
            continue;
        };

        if existing != constraint {
            actions.push(
                TableAction::new(TableActionKind::DropConstraint, table)
                    .with_column(desired)
                    .with_constraint(existing)
                    .into(),
            );
            actions.push(
                TableAction::new(TableActionKind::AddConstraint, table)
                    .with_column(desired)
                    .with_constraint(constraint)
                    .into(),
            );
        }
    }
}

fn normalized_default(column: &Column) -> String {
    column.default.as_deref().unwrap_or("").to_lowercase()
}

/// Ordered actions needed to synchronize two schemas
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    actions: Vec<Action>,
}

impl SchemaDiff {
    /// Generate a schema diff between the desired and observed schemas
    pub fn generate(desired: &Schema, observed: &Schema) -> Self {
        Self {
            actions: diff(desired, observed),
        }
    }

    /// Check if the diff is empty (schemas are in sync)
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    /// Compile every action, in order, to one SQL statement each
    pub fn to_sql(&self) -> Result<Vec<String>> {
        compiler::compile_all(&self.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{Constraint, EnumType, Index, IndexKind};
    use pretty_assertions::assert_eq;

    fn kinds(actions: &[Action]) -> Vec<String> {
        actions.iter().map(|a| a.describe()).collect()
    }

    #[test]
    fn test_identical_schemas_produce_nothing() {
        let mut schema = Schema::new();
        schema.add_enum(EnumType::new("status", &["a", "b"]));
        schema.add_table(
            Table::new("users")
                .with_column(Column::new("id", "serial").primary_key().auto_increment())
                .with_column(Column::new("email", "text").constraint(Constraint::Unique))
                .with_index(Index::new("idx_users_index_email", IndexKind::Plain, &["email"])),
        );

        assert!(diff(&schema, &schema).is_empty());
        assert!(SchemaDiff::generate(&schema, &schema).is_empty());
    }

    #[test]
    fn test_default_compare_is_case_insensitive() {
        let desired = Table::new("t").with_column(Column::new("at", "timestamptz(3)").default("NOW()"));
        let observed = Table::new("t").with_column(Column::new("at", "timestamptz(3)").default("now()"));
        let mut actions = Vec::new();
        diff_table(&desired, &observed, &mut actions);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_primary_key_nullability_is_ignored() {
        let desired = Table::new("t").with_column(Column::new("id", "int4").nullable(true).primary_key());
        let observed = Table::new("t").with_column(Column::new("id", "int4").primary_key());
        let mut actions = Vec::new();
        diff_table(&desired, &observed, &mut actions);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_column_mutation_order() {
        let desired = Table::new("t").with_column(
            Column::new("c", "uuid")
                .nullable(true)
                .constraint(Constraint::Unique),
        );
        let observed = Table::new("t").with_column(Column::new("c", "text").default("'x'"));
        let mut actions = Vec::new();
        diff_table(&desired, &observed, &mut actions);

        assert_eq!(
            kinds(&actions),
            vec![
                "ChangeDataType t.c",
                "SetDefault t.c",
                "SetNullable t.c",
                "AddConstraint t.c",
            ]
        );
    }
}
