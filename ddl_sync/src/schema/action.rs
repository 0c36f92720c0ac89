//! Actions: single DDL changes produced by the differ

use serde::{Deserialize, Serialize};

use crate::schema::types::{Column, Constraint, EnumType, Index, Table};

/// One atomic DDL change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    Table(TableAction),
    Enum(EnumAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableActionKind {
    CreateTable,
    DropTable,
    CreateIndex,
    DropIndex,
    CreateColumn,
    DropColumn,
    ChangeDataType,
    SetNullable,
    SetNotNullable,
    SetDefault,
    AddConstraint,
    DropConstraint,
}

/// A change to a table. Which optional fields are set depends on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableAction {
    pub kind: TableActionKind,
    pub table: Table,
    pub index: Option<Index>,
    pub column: Option<Column>,
    pub constraint: Option<Constraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnumActionKind {
    CreateEnum,
    DropEnum,
    AddEnumValue,
}

/// A change to an enum type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumAction {
    pub kind: EnumActionKind,
    pub enum_type: EnumType,
    pub value: Option<String>,
}

impl TableAction {
    pub fn new(kind: TableActionKind, table: &Table) -> Self {
        Self {
            kind,
            table: table.clone(),
            index: None,
            column: None,
            constraint: None,
        }
    }

    pub fn with_index(mut self, index: &Index) -> Self {
        self.index = Some(index.clone());
        self
    }

    pub fn with_column(mut self, column: &Column) -> Self {
        self.column = Some(column.clone());
        self
    }

    pub fn with_constraint(mut self, constraint: &Constraint) -> Self {
        self.constraint = Some(constraint.clone());
        self
    }
}

impl EnumAction {
    pub fn new(kind: EnumActionKind, enum_type: &EnumType) -> Self {
        Self {
            kind,
            enum_type: enum_type.clone(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

impl From<TableAction> for Action {
    fn from(action: TableAction) -> Self {
        Action::Table(action)
    }
}

impl From<EnumAction> for Action {
    fn from(action: EnumAction) -> Self {
        Action::Enum(action)
    }
}

impl Action {
    /// Name of the table or enum the action targets
    pub fn target(&self) -> &str {
        match self {
            Action::Table(action) => &action.table.name,
            Action::Enum(action) => &action.enum_type.name,
        }
    }

    /// Short human-readable summary for logs
    pub fn describe(&self) -> String {
        match self {
            Action::Table(action) => {
                let detail = action
                    .column
                    .as_ref()
                    .map(|c| c.name.as_str())
                    .or_else(|| action.index.as_ref().map(|i| i.name.as_str()));
                match detail {
                    Some(detail) => format!("{:?} {}.{}", action.kind, action.table.name, detail),
                    None => format!("{:?} {}", action.kind, action.table.name),
                }
            }
            Action::Enum(action) => match &action.value {
                Some(value) => format!("{:?} {} '{}'", action.kind, action.enum_type.name, value),
                None => format!("{:?} {}", action.kind, action.enum_type.name),
            },
        }
    }
}
