//! Type definitions for database schema objects
//!
//! These are plain value snapshots. A [`Schema`] is built fresh by the
//! desired-schema provider or by the observer and handed to the differ;
//! nothing here talks to a database.

use serde::{Deserialize, Serialize};

/// A schema snapshot: the tables and enum types of one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub enums: Vec<EnumType>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table to the schema
    pub fn add_table(&mut self, table: Table) {
        self.tables.push(table);
    }

    /// Add an enum type to the schema
    pub fn add_enum(&mut self, enum_type: EnumType) {
        self.enums.push(enum_type);
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Look up an enum type by name
    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.enums.is_empty()
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Add an index to the table
    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    /// Builder form of [`Table::add_column`]
    pub fn with_column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    /// Builder form of [`Table::add_index`]
    pub fn with_index(mut self, index: Index) -> Self {
        self.add_index(index);
        self
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Represents a database column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Canonical type string, e.g. `int4`, `varchar(64)`, `timestamptz(3)`
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub default: Option<String>,
    pub constraints: Vec<Constraint>,
}

impl Column {
    /// Create a new non-nullable column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: false,
            primary_key: false,
            auto_increment: false,
            default: None,
            constraints: Vec::new(),
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark the column as the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark the column as auto-incrementing
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Attach a constraint to the column
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Effective nullability. A primary key column is never nullable.
    pub fn is_nullable(&self) -> bool {
        self.nullable && !self.primary_key
    }
}

/// A single-column constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    ForeignKey {
        /// Target in `table(column)` form
        references: String,
        on_delete: Option<String>,
    },
    Unique,
}

/// The tag of a [`Constraint`], without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
}

impl Constraint {
    /// Foreign key to `references` with no delete action
    pub fn foreign_key(references: &str) -> Self {
        Constraint::ForeignKey {
            references: references.to_string(),
            on_delete: None,
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::ForeignKey { .. } => ConstraintKind::ForeignKey,
            Constraint::Unique => ConstraintKind::Unique,
        }
    }
}

impl ConstraintKind {
    /// Prefix of the generated constraint name
    pub fn name_prefix(self) -> &'static str {
        match self {
            ConstraintKind::ForeignKey => "fk",
            ConstraintKind::Unique => "uq",
        }
    }
}

/// Index flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Plain,
    Unique,
}

impl IndexKind {
    /// Label used inside generated index names
    pub fn label(self) -> &'static str {
        match self {
            IndexKind::Plain => "index",
            IndexKind::Unique => "unique",
        }
    }
}

/// Represents an index. Equal iff name, kind and column list match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

impl Index {
    pub fn new(name: &str, kind: IndexKind, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A database enum type. Value order is the ordinal order in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumType {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_is_never_nullable() {
        let column = Column::new("id", "int4").nullable(true).primary_key();
        assert!(column.nullable);
        assert!(!column.is_nullable());

        let column = Column::new("bio", "text").nullable(true);
        assert!(column.is_nullable());
    }

    #[test]
    fn test_constraint_equality_is_structural() {
        assert_eq!(Constraint::foreign_key("users(id)"), Constraint::foreign_key("users(id)"));
        assert_ne!(Constraint::foreign_key("users(id)"), Constraint::foreign_key("teams(id)"));
        assert_eq!(
            Constraint::foreign_key("users(id)").kind(),
            Constraint::foreign_key("teams(id)").kind()
        );
        assert_ne!(Constraint::Unique.kind(), Constraint::foreign_key("users(id)").kind());
    }

    #[test]
    fn test_index_equality() {
        let a = Index::new("idx_t_index_a_b", IndexKind::Plain, &["a", "b"]);
        assert_eq!(a, Index::new("idx_t_index_a_b", IndexKind::Plain, &["a", "b"]));
        assert_ne!(a, Index::new("idx_t_index_a_b", IndexKind::Plain, &["b", "a"]));
        assert_ne!(a, Index::new("idx_t_index_a_b", IndexKind::Unique, &["a", "b"]));
    }

    #[test]
    fn test_lookups() {
        let mut schema = Schema::new();
        assert!(schema.is_empty());
        schema.add_table(Table::new("users").with_column(Column::new("id", "serial")));
        schema.add_enum(EnumType::new("status", &["a", "b"]));

        assert!(schema.table("users").and_then(|t| t.column("id")).is_some());
        assert!(schema.table("posts").is_none());
        assert_eq!(schema.enum_type("status").map(|e| e.values.len()), Some(2));
    }
}
