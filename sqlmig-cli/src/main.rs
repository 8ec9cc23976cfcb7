//! `sqlmig` command line tool.

mod cli;
mod commands;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands};
use sqlmig::{MigrationSource, Migrator};
use std::error::Error;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let level = match cli.global.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = cli.global.connection_config();
    config.validate()?;

    let migrator = Migrator::new(MigrationSource::new(&cli.global.migrations_dir))
        .try_with_table_name(&cli.global.table)?
        .on_migration_start(|name, index, total| {
            println!("[{}/{}] Running {}...", index, total, name);
        })
        .on_migration_complete(|name, duration| {
            println!("        {} done in {:.2?}", name, duration);
        })
        .on_migration_error(|name, error| {
            eprintln!("        {} FAILED: {}", name, error);
        });

    // reject a bad migrations directory before the database is contacted
    migrator.source().check()?;

    tracing::debug!(?config, "Connecting");
    let mut driver = sqlmig::config::connect(&config)?;

    match cli.command {
        Commands::Bootstrap { no_load_existing } => {
            commands::bootstrap(&migrator, &mut *driver, !no_load_existing)
        }
        Commands::Drop { yes } => commands::drop(&migrator, &mut *driver, &config, yes),
        Commands::List { format } => commands::list(&migrator, &mut *driver, format),
        Commands::Migrate {
            no_backup,
            backup_dir,
        } => {
            let migrator = match backup_dir {
                Some(dir) => migrator.with_backup_dir(dir),
                None => migrator,
            };
            if no_backup {
                commands::migrate(&migrator, &mut *driver, None, &config)
            } else {
                let mut tool = sqlmig::config::dump_tool(&config)?;
                commands::migrate(&migrator, &mut *driver, Some(&mut *tool), &config)
            }
        }
        Commands::Snapshot { outfile } => {
            let mut tool = sqlmig::config::dump_tool(&config)?;
            commands::snapshot(&migrator, &mut *driver, &mut *tool, &outfile)
        }
        Commands::Test {
            yes,
            current,
            target,
        } => {
            let mut tool = sqlmig::config::dump_tool(&config)?;
            commands::test(
                &migrator,
                &mut *driver,
                &mut *tool,
                &config,
                yes,
                &current,
                &target,
            )
        }
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[test]
    fn missing_migrations_directory_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("typo.db");
        let migrations = dir.path().join("missing");
        let cli = Cli::try_parse_from([
            "sqlmig",
            "-t",
            "sqlite",
            "-d",
            database.to_str().unwrap(),
            "-m",
            migrations.to_str().unwrap(),
            "list",
        ])
        .unwrap();

        let error = run(cli).unwrap_err();
        assert!(error.to_string().contains("migrations directory"));
        assert!(!database.exists());
    }

    #[test]
    fn bootstrap_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("app.db");
        let migrations = dir.path().join("migrations");
        std::fs::create_dir(&migrations).unwrap();
        std::fs::write(migrations.join("1_users.sql"), "CREATE TABLE users (id INTEGER);")
            .unwrap();
        let args = |command: &'static str| {
            Cli::try_parse_from([
                "sqlmig",
                "-t",
                "sqlite",
                "-d",
                database.to_str().unwrap(),
                "-m",
                migrations.to_str().unwrap(),
                command,
            ])
            .unwrap()
        };

        run(args("bootstrap")).unwrap();
        run(args("list")).unwrap();
        assert!(database.exists());
    }
}
