//! Command implementations behind the `ddl_sync` binary

use std::fs;
use std::path::Path;

use crate::cli::{DiffArgs, InitArgs, MigrateArgs, MigrateSubcommand};
use crate::config::{self, Config};
use crate::db::connection::reset_database;
use crate::db::units::MigrationDirectory;
use crate::error::{Error, Result};
use crate::SyncClient;

/// Write a starter configuration and create the migrations and models directories
pub fn init(config_path: &Path, args: InitArgs) -> Result<()> {
    if config_path.exists() && !args.force {
        return Err(Error::ConfigError(format!(
            "{} already exists, pass --force to overwrite it",
            config_path.display()
        )));
    }

    let config = Config::new(&args.url);

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(config_path, config.to_toml_string()?)?;
    println!("Wrote {}", config_path.display());

    MigrationDirectory::new(&config.migrations.directory).ensure_exists()?;
    println!("Created {}", config.migrations.directory);

    for models_path in &config.models.paths {
        fs::create_dir_all(models_path)?;
        println!("Created {}", models_path);
    }

    Ok(())
}

/// Print the pending changes without writing or applying anything
pub async fn diff(config_path: &Path, args: DiffArgs) -> Result<()> {
    let client = connect(config_path, true).await?;
    let diff = client.generate_schema_diff().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(diff.actions())?);
    } else if diff.is_empty() {
        println!("Database is up to date with models");
    } else {
        for statement in diff.to_sql()? {
            println!("{};", statement);
        }
    }

    client.close().await;
    Ok(())
}

pub async fn migrate(config_path: &Path, args: MigrateArgs) -> Result<()> {
    match args.command {
        MigrateSubcommand::Dev(dev_args) => {
            let client = connect(config_path, true).await?;
            match client.migrate_dev(&dev_args.name).await? {
                Some(unit) => {
                    println!("Applied migration {}:", unit.name);
                    for statement in &unit.statements {
                        println!("  {};", statement);
                    }
                }
                None => println!("Database is up to date with models"),
            }
            client.close().await;
        }
        MigrateSubcommand::Deploy => {
            let client = connect(config_path, false).await?;
            let report = client.apply_migrations().await?;
            print_report(&report.applied);
            client.close().await;
        }
        MigrateSubcommand::Create(create_args) => {
            let config = config::load_from_file(config_path)?;
            let unit = MigrationDirectory::new(&config.migrations.directory)
                .create_empty(&create_args.name)?;
            println!("Created migration {}", unit.name);
        }
        MigrateSubcommand::Status => {
            let client = connect(config_path, false).await?;
            let status = client.migration_status().await?;
            for name in &status.applied {
                println!("applied  {}", name);
            }
            for name in &status.pending {
                println!("pending  {}", name);
            }
            if status.pending.is_empty() {
                println!("No pending migrations");
            }
            client.close().await;
        }
        MigrateSubcommand::Reset(reset_args) => {
            if !reset_args.force {
                return Err(Error::ConfigError(
                    "Resetting drops every table and row, pass --force to confirm".to_string(),
                ));
            }
            let config = config::load_from_file(config_path)?;
            reset_database(&config.database.url).await?;

            let client = SyncClient::new(config).await?;
            let report = client.apply_migrations().await?;
            print_report(&report.applied);
            client.close().await;
            println!("Database reset");
        }
    }

    Ok(())
}

async fn connect(config_path: &Path, with_models: bool) -> Result<SyncClient> {
    let config = config::load_from_file(config_path)?;
    let mut client = SyncClient::new(config).await?;
    if with_models {
        client.register_models()?;
    }
    Ok(client)
}

fn print_report(applied: &[String]) {
    if applied.is_empty() {
        println!("No pending migrations");
    }
    for name in applied {
        println!("Applied {}", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("ddl_sync.toml");
        fs::write(&config_path, "existing").unwrap();

        let args = InitArgs {
            url: "postgres://localhost/app".to_string(),
            force: false,
        };
        assert!(matches!(init(&config_path, args), Err(Error::ConfigError(_))));
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "existing");
    }
}
