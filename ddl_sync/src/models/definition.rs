//! Model declarations
//!
//! What a `#[derive(Model)]` struct or `#[derive(DbEnum)]` enum declares,
//! captured before any type mapping or naming is applied. The derive
//! macros and the source scanner both produce these.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::schema::types::IndexKind;

/// A struct field as declared
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    /// Rust type with whitespace removed, e.g. `Option<chrono::DateTime<Utc>>`
    pub rust_type: String,
    /// Explicit database type, bypasses type mapping
    pub data_type: Option<String>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub foreign_key: Option<ForeignKeyDefinition>,
}

impl FieldDefinition {
    pub fn new(name: &str, rust_type: &str) -> Self {
        Self {
            name: name.to_string(),
            rust_type: normalize_type(rust_type),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// `table(column)`
    pub references: String,
    pub on_delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

/// A declared model struct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Rust struct name
    pub name: String,
    /// Explicit `#[model(table = "..")]`
    pub table_name: Option<String>,
    pub fields: Vec<FieldDefinition>,
    pub indexes: Vec<IndexDefinition>,
    /// Source file, when discovered by scanning
    pub file_path: Option<PathBuf>,
}

/// A declared enum variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDefinition {
    pub name: String,
    pub rename: Option<String>,
}

/// A declared database enum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumInfo {
    /// Rust enum name
    pub name: String,
    /// Explicit `#[db_enum(name = "..")]`
    pub db_name: Option<String>,
    pub variants: Vec<VariantDefinition>,
    pub file_path: Option<PathBuf>,
}

/// Implemented by `#[derive(Model)]`
pub trait SyncModel {
    fn model_info() -> ModelInfo;
}

/// Implemented by `#[derive(DbEnum)]`
pub trait SyncEnum {
    fn enum_info() -> EnumInfo;
}

/// Strip whitespace so token-printed types compare reliably
pub fn normalize_type(rust_type: &str) -> String {
    rust_type.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Split `Option<T>` into `(T, true)`; anything else is `(ty, false)`
pub fn unwrap_option(rust_type: &str) -> (&str, bool) {
    const OPTION_PREFIXES: [&str; 3] = ["Option<", "std::option::Option<", "core::option::Option<"];

    for prefix in OPTION_PREFIXES {
        if let Some(inner) = rust_type
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return (inner, true);
        }
    }

    (rust_type, false)
}

/// Last path segment without generics: `chrono::DateTime<Utc>` -> `DateTime`
pub fn base_type_name(rust_type: &str) -> &str {
    let head = rust_type.split('<').next().unwrap_or(rust_type);
    head.rsplit("::").next().unwrap_or(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_option() {
        assert_eq!(unwrap_option("Option<String>"), ("String", true));
        assert_eq!(
            unwrap_option("std::option::Option<chrono::DateTime<Utc>>"),
            ("chrono::DateTime<Utc>", true)
        );
        assert_eq!(unwrap_option("Vec<u8>"), ("Vec<u8>", false));
    }

    #[test]
    fn test_base_type_name() {
        assert_eq!(base_type_name("chrono::DateTime<chrono::Utc>"), "DateTime");
        assert_eq!(base_type_name("uuid::Uuid"), "Uuid");
        assert_eq!(base_type_name("i32"), "i32");
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("Option < Vec < u8 > >"), "Option<Vec<u8>>");
        assert_eq!(FieldDefinition::new("x", "Option < i32 >").rust_type, "Option<i32>");
    }
}
