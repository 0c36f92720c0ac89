//! Utilities for ddl_sync
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

pub use naming::{
    apply_naming_convention, create_migration_name, get_constraint_name, get_index_name,
    get_table_name,
};
