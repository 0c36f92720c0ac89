//! Migration units on disk
//!
//! One TOML file per unit, named `<unit name>.toml`:
//!
//! ```toml
//! name = "1731295492921_init"
//! created_at = "2024-11-11T03:24:52.921Z"
//! statements = ["CREATE TABLE ...", "CREATE INDEX ..."]
//! ```
//!
//! Units apply in `created_at` order, with the name as tiebreaker. Generated
//! names start with the creation millis, so this is also name order. A hand
//! edited `created_at` that disagrees with its name prefix still wins, and
//! loading logs a warning for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::naming::create_migration_name;

/// A named, ordered list of statements applied together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationUnit {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub statements: Vec<String>,
}

impl MigrationUnit {
    pub fn new(name: &str, created_at: DateTime<Utc>, statements: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            created_at,
            statements,
        }
    }

    /// Build a unit whose name is derived from `description` and `created_at`
    pub fn describe(description: &str, created_at: DateTime<Utc>, statements: Vec<String>) -> Self {
        Self::new(
            &create_migration_name(description, created_at),
            created_at,
            statements,
        )
    }
}

/// Apply order: creation time first, name as tiebreaker
pub fn sort_units(units: &mut [MigrationUnit]) {
    units.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });

    for (earlier, later) in out_of_name_order(units) {
        tracing::warn!(
            earlier = %earlier,
            later = %later,
            "created_at order disagrees with name order, applying by created_at"
        );
    }
}

/// Adjacent pairs of sorted units whose names sort the other way round
pub fn out_of_name_order(units: &[MigrationUnit]) -> Vec<(String, String)> {
    units
        .windows(2)
        .filter(|pair| pair[0].name > pair[1].name)
        .map(|pair| (pair[0].name.clone(), pair[1].name.clone()))
        .collect()
}

/// Directory holding migration unit files
#[derive(Debug, Clone)]
pub struct MigrationDirectory {
    path: PathBuf,
}

impl MigrationDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Read every unit in the directory, in apply order
    pub fn load_units(&self) -> Result<Vec<MigrationUnit>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let pattern = self.path.join("*.toml");
        let pattern = pattern.to_str().ok_or_else(|| {
            Error::MigrationError(format!("Non UTF-8 migrations path: {}", self.path.display()))
        })?;

        let paths = glob::glob(pattern)
            .map_err(|e| Error::MigrationError(format!("Invalid migrations path: {}", e)))?;

        let mut units = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| Error::MigrationError(e.to_string()))?;
            units.push(read_unit(&path)?);
        }

        let mut seen = std::collections::HashSet::new();
        for unit in &units {
            if !seen.insert(unit.name.as_str()) {
                return Err(Error::MigrationError(format!(
                    "Duplicate migration name: {}",
                    unit.name
                )));
            }
        }

        sort_units(&mut units);
        Ok(units)
    }

    /// Persist compiled statements as a new unit (the migration writer)
    pub fn write_unit(&self, description: &str, statements: Vec<String>) -> Result<MigrationUnit> {
        let unit = MigrationUnit::describe(description, Utc::now(), statements);
        self.save(&unit)?;
        Ok(unit)
    }

    /// Scaffold an empty unit to be filled in by hand
    pub fn create_empty(&self, description: &str) -> Result<MigrationUnit> {
        self.write_unit(description, Vec::new())
    }

    /// Write `unit` to `<name>.toml`, refusing to overwrite
    pub fn save(&self, unit: &MigrationUnit) -> Result<PathBuf> {
        self.ensure_exists()?;

        let path = self.path.join(format!("{}.toml", unit.name));
        if path.exists() {
            return Err(Error::MigrationError(format!(
                "Migration file already exists: {}",
                path.display()
            )));
        }

        fs::write(&path, toml::to_string_pretty(unit)?)?;
        tracing::info!(unit = %unit.name, path = %path.display(), "Wrote migration");

        Ok(path)
    }
}

fn read_unit(path: &Path) -> Result<MigrationUnit> {
    let content = fs::read_to_string(path)?;
    let unit: MigrationUnit = toml::from_str(&content).map_err(|e| {
        Error::MigrationError(format!("Failed to parse {}: {}", path.display(), e))
    })?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if stem != unit.name {
        tracing::warn!(
            unit = %unit.name,
            file = %path.display(),
            "Migration file name does not match its unit name"
        );
    }

    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let migrations = MigrationDirectory::new(dir.path().join("migrations"));

        let written = migrations
            .write_unit("init", vec!["CREATE TABLE a (id SERIAL PRIMARY KEY)".to_string()])
            .unwrap();
        assert!(written.name.ends_with("_init"));

        let loaded = migrations.load_units().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, written.name);
        assert_eq!(loaded[0].statements, written.statements);
    }

    #[test]
    fn test_missing_directory_has_no_units() {
        let dir = tempdir().unwrap();
        let migrations = MigrationDirectory::new(dir.path().join("nope"));
        assert!(migrations.load_units().unwrap().is_empty());
    }

    #[test]
    fn test_units_load_in_creation_order() {
        let dir = tempdir().unwrap();
        let migrations = MigrationDirectory::new(dir.path());
        let later = Utc.timestamp_millis_opt(1732076267268).unwrap();
        let earlier = Utc.timestamp_millis_opt(1731295492921).unwrap();

        migrations
            .save(&MigrationUnit::describe("second", later, vec![]))
            .unwrap();
        migrations
            .save(&MigrationUnit::describe("first", earlier, vec![]))
            .unwrap();

        let names: Vec<String> = migrations
            .load_units()
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["1731295492921_first", "1732076267268_second"]);
    }

    #[test]
    fn test_edited_created_at_wins_over_name() {
        let mut units = vec![
            MigrationUnit::new("100_a", Utc.timestamp_millis_opt(300).unwrap(), vec![]),
            MigrationUnit::new("200_b", Utc.timestamp_millis_opt(200).unwrap(), vec![]),
            MigrationUnit::new("300_c", Utc.timestamp_millis_opt(400).unwrap(), vec![]),
        ];

        sort_units(&mut units);

        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["200_b", "100_a", "300_c"]);
        assert_eq!(
            out_of_name_order(&units),
            vec![("200_b".to_string(), "100_a".to_string())]
        );
    }

    #[test]
    fn test_generated_units_agree_on_both_orders() {
        let mut units = vec![
            MigrationUnit::describe("b", Utc.timestamp_millis_opt(2000).unwrap(), vec![]),
            MigrationUnit::describe("a", Utc.timestamp_millis_opt(1000).unwrap(), vec![]),
        ];
        sort_units(&mut units);
        assert!(out_of_name_order(&units).is_empty());
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let migrations = MigrationDirectory::new(dir.path());
        let unit = MigrationUnit::new("1_x", Utc::now(), vec![]);
        migrations.save(&unit).unwrap();
        assert!(matches!(migrations.save(&unit), Err(Error::MigrationError(_))));
    }

    #[test]
    fn test_malformed_unit_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("1_bad.toml"), "statements = 3").unwrap();
        let err = MigrationDirectory::new(dir.path()).load_units().unwrap_err();
        assert!(matches!(err, Error::MigrationError(_)));
    }
}
