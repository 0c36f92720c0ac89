//! Schema module for ddl_sync
//!
//! The schema model, database introspection, diffing and SQL compilation.

pub mod action;
pub mod analyzer;
pub mod compiler;
pub mod diff;
pub mod types;

pub use action::{Action, EnumAction, EnumActionKind, TableAction, TableActionKind};
pub use analyzer::{SchemaAnalyzer, SchemaObserver};
pub use compiler::{compile, compile_all};
pub use diff::{diff, SchemaDiff};
pub use types::{
    Column, Constraint, ConstraintKind, EnumType, Index, IndexKind, Schema, Table,
};
