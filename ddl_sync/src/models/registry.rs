//! Model registry for ddl_sync
//!
//! Collects model and enum declarations, either registered in code through
//! the derive macros or discovered by scanning source directories, and
//! turns them into the desired [`Schema`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::{Config, ModelsConfig, NamingConfig, TypeMappingConfig};
use crate::error::{Error, Result};
use crate::models::definition::{
    base_type_name, normalize_type, unwrap_option, EnumInfo, FieldDefinition, ModelInfo,
    SyncEnum, SyncModel,
};
use crate::models::parse::parse_source;
use crate::schema::types::{Column, Constraint, EnumType, Index, Schema, Table};
use crate::utils::naming::{apply_naming_convention, get_index_name, get_table_name};

static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\([A-Za-z_][A-Za-z0-9_]*\)$").unwrap());

/// Source of the desired schema
pub trait SchemaProvider {
    fn desired_schema(&self) -> Result<Schema>;
}

/// Registry for ddl_sync models, in registration order
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelInfo>,
    enums: IndexMap<String, EnumInfo>,
    models_config: ModelsConfig,
    naming: NamingConfig,
    type_mapping: TypeMappingConfig,
}

impl ModelRegistry {
    /// Create a new model registry
    pub fn new(config: &Config) -> Self {
        Self {
            models: IndexMap::new(),
            enums: IndexMap::new(),
            models_config: config.models.clone(),
            naming: config.naming.clone(),
            type_mapping: config.type_mapping.clone(),
        }
    }

    /// Register a `#[derive(Model)]` type
    pub fn register<T: SyncModel>(&mut self) -> Result<()> {
        self.add_model(T::model_info())
    }

    /// Register a `#[derive(DbEnum)]` type
    pub fn register_enum<T: SyncEnum>(&mut self) -> Result<()> {
        self.add_enum(T::enum_info())
    }

    pub fn add_model(&mut self, model: ModelInfo) -> Result<()> {
        if self.models.contains_key(&model.name) {
            return Err(Error::ModelRegistrationError(format!(
                "Model {} is registered twice",
                model.name
            )));
        }
        tracing::debug!(model = %model.name, "Registered model");
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    pub fn add_enum(&mut self, enum_info: EnumInfo) -> Result<()> {
        if self.enums.contains_key(&enum_info.name) {
            return Err(Error::ModelRegistrationError(format!(
                "Enum {} is registered twice",
                enum_info.name
            )));
        }
        tracing::debug!(enum_name = %enum_info.name, "Registered enum");
        self.enums.insert(enum_info.name.clone(), enum_info);
        Ok(())
    }

    /// Scan the configured directories for model declarations and register them
    pub fn scan_and_register(&mut self) -> Result<()> {
        let paths = self.models_config.paths.clone();
        let exclude_paths = self.models_config.exclude_paths.clone();
        let max_depth = if self.models_config.recursive_scan { usize::MAX } else { 1 };

        for path in &paths {
            let base_path = Path::new(path);

            if !base_path.exists() {
                return Err(Error::ModelRegistrationError(format!(
                    "Path does not exist: {}",
                    path
                )));
            }

            // Sorted so registration order does not depend on the filesystem
            for entry in WalkDir::new(base_path)
                .follow_links(true)
                .max_depth(max_depth)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();

                if exclude_paths.iter().any(|exclude| path.starts_with(exclude)) {
                    continue;
                }

                if path.is_file() && path.extension().map_or(false, |ext| ext == "rs") {
                    self.process_file(path)?;
                }
            }
        }

        tracing::info!(
            models = self.models.len(),
            enums = self.enums.len(),
            "Model scan complete"
        );

        Ok(())
    }

    /// Parse one Rust file and register what it declares
    fn process_file(&mut self, file_path: &Path) -> Result<()> {
        let file_content = std::fs::read_to_string(file_path)?;
        let declarations = parse_source(&file_content).map_err(|e| {
            Error::SyntaxError(format!("Failed to parse {}: {}", file_path.display(), e))
        })?;

        for mut enum_info in declarations.enums {
            enum_info.file_path = Some(file_path.to_path_buf());
            self.add_enum(enum_info)?;
        }

        for mut model in declarations.models {
            model.file_path = Some(file_path.to_path_buf());
            self.add_model(model)?;
        }

        Ok(())
    }

    pub fn get_models(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.values()
    }

    pub fn get_model(&self, name: &str) -> Option<&ModelInfo> {
        self.models.get(name)
    }

    pub fn get_enums(&self) -> impl Iterator<Item = &EnumInfo> {
        self.enums.values()
    }

    /// Database name of a registered enum
    fn enum_db_name(enum_info: &EnumInfo) -> String {
        enum_info
            .db_name
            .clone()
            .unwrap_or_else(|| apply_naming_convention(&enum_info.name, "snake_case"))
    }

    fn table_name(&self, model: &ModelInfo) -> String {
        model.table_name.clone().unwrap_or_else(|| {
            get_table_name(
                &model.name,
                &self.naming.table_style,
                self.naming.pluralize_tables,
            )
        })
    }

    /// Map a (non-optional) Rust type to a database type
    pub fn map_type_to_db_type(&self, rust_type: &str) -> Result<String> {
        let rust_type = normalize_type(rust_type);
        let base = base_type_name(&rust_type);

        for mapping in &self.type_mapping.custom {
            let mapped = normalize_type(&mapping.rust_type);
            if mapped == rust_type || mapped == base {
                return Ok(mapping.db_type.clone());
            }
        }

        if let Some(enum_info) = self.enums.get(base) {
            return Ok(Self::enum_db_name(enum_info));
        }

        if rust_type == "Vec<u8>" {
            return Ok("bytea".to_string());
        }

        let db_type = match base {
            "String" | "str" | "&str" => "text",
            "i8" | "i16" | "u8" => "int2",
            "i32" | "u16" => "int4",
            "i64" | "u32" => "int8",
            "f32" => "float4",
            "f64" => "float8",
            "bool" => "bool",
            "DateTime" => "timestamptz(3)",
            "NaiveDateTime" => "timestamp",
            "NaiveDate" => "date",
            "NaiveTime" => "time",
            "Uuid" => "uuid",
            "Decimal" => "numeric",
            "Value" | "Json" | "Vec" | "HashMap" | "BTreeMap" => "jsonb",
            _ => {
                return Err(Error::TypeMappingError(format!(
                    "No mapping found for Rust type: {}",
                    rust_type
                )))
            }
        };

        Ok(db_type.to_string())
    }

    fn field_to_column(&self, model: &ModelInfo, field: &FieldDefinition) -> Result<Column> {
        let (inner_type, is_option) = unwrap_option(&field.rust_type);

        let data_type = match (&field.data_type, field.auto_increment) {
            (Some(_), true) => {
                return Err(Error::ModelRegistrationError(format!(
                    "{}.{}: data_type cannot be combined with auto_increment",
                    model.name, field.name
                )));
            }
            (Some(data_type), false) => data_type.clone(),
            (None, auto_increment) => {
                let mapped = self.map_type_to_db_type(inner_type).map_err(|e| {
                    Error::TypeMappingError(format!("{}.{}: {}", model.name, field.name, e))
                })?;
                if auto_increment {
                    serial_type(&mapped).ok_or_else(|| {
                        Error::ModelRegistrationError(format!(
                            "{}.{}: auto_increment needs an integer field, got {}",
                            model.name, field.name, field.rust_type
                        ))
                    })?
                } else {
                    mapped
                }
            }
        };

        let nullable = is_option
            && field.default.is_none()
            && !field.primary_key
            && !field.auto_increment;

        let mut constraints = Vec::new();
        if let Some(fk) = &field.foreign_key {
            if !REFERENCE_PATTERN.is_match(&fk.references) {
                return Err(Error::ModelRegistrationError(format!(
                    "{}.{}: foreign key must look like table(column), got {}",
                    model.name, field.name, fk.references
                )));
            }
            constraints.push(Constraint::ForeignKey {
                references: fk.references.clone(),
                on_delete: fk.on_delete.as_ref().map(|a| a.to_uppercase()),
            });
        }
        if field.unique {
            constraints.push(Constraint::Unique);
        }

        Ok(Column {
            name: field.name.clone(),
            data_type,
            nullable,
            primary_key: field.primary_key,
            auto_increment: field.auto_increment,
            default: field.default.clone(),
            constraints,
        })
    }

    fn model_to_table(&self, model: &ModelInfo) -> Result<Table> {
        let mut table = Table::new(&self.table_name(model));

        for field in &model.fields {
            table.add_column(self.field_to_column(model, field)?);
        }

        for index in &model.indexes {
            if let Some(missing) = index.columns.iter().find(|c| table.column(c).is_none()) {
                return Err(Error::ModelRegistrationError(format!(
                    "{}: index column {} is not a field",
                    model.name, missing
                )));
            }
            table.add_index(Index {
                name: get_index_name(&table.name, index.kind, &index.columns),
                kind: index.kind,
                columns: index.columns.clone(),
            });
        }

        Ok(table)
    }

    /// Convert registered declarations to the desired schema
    pub fn to_schema(&self) -> Result<Schema> {
        let mut schema = Schema::new();

        for enum_info in self.enums.values() {
            let name = Self::enum_db_name(enum_info);
            if schema.enum_type(&name).is_some() {
                return Err(Error::ModelRegistrationError(format!(
                    "Two enums map to database type {}",
                    name
                )));
            }
            let values = enum_info
                .variants
                .iter()
                .map(|v| {
                    v.rename
                        .clone()
                        .unwrap_or_else(|| apply_naming_convention(&v.name, "snake_case"))
                })
                .collect();
            schema.add_enum(EnumType { name, values });
        }

        for model in self.models.values() {
            let table = self.model_to_table(model)?;
            if schema.table(&table.name).is_some() {
                return Err(Error::ModelRegistrationError(format!(
                    "Two models map to table {}",
                    table.name
                )));
            }
            schema.add_table(table);
        }

        Ok(schema)
    }
}

/// Serial pseudo-type matching an integer column's width
fn serial_type(db_type: &str) -> Option<String> {
    match db_type {
        "int2" => Some("smallserial".to_string()),
        "int4" => Some("serial".to_string()),
        "int8" => Some("bigserial".to_string()),
        _ => None,
    }
}

impl SchemaProvider for ModelRegistry {
    fn desired_schema(&self) -> Result<Schema> {
        self.to_schema()
    }
}
