//! Models module for ddl_sync
//!
//! Model declarations, discovery and conversion to the desired schema.

pub mod definition;
pub mod parse;
pub mod registry;

pub use definition::{
    EnumInfo, FieldDefinition, ForeignKeyDefinition, IndexDefinition, ModelInfo, SyncEnum,
    SyncModel, VariantDefinition,
};
pub use registry::{ModelRegistry, SchemaProvider};
