//! One function per subcommand.

use crate::cli::OutputFormat;
use crate::formatter::format_records;
use sqlmig::{ConnectionConfig, Driver, DumpTool, Migrator, Recovery};
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::Path;

type CommandResult = Result<(), Box<dyn Error>>;

/// Ask for confirmation on stdin unless `yes` was given.
fn confirm(warning: &str, yes: bool) -> CommandResult {
    eprintln!("{}", warning);
    if yes {
        return Ok(());
    }
    eprint!("Are you 100% positive that you want to do this? [y/N]: ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    if matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
        Ok(())
    } else {
        Err("Aborted!".into())
    }
}

pub fn bootstrap(migrator: &Migrator, driver: &mut dyn Driver, load_existing: bool) -> CommandResult {
    let report = migrator.bootstrap(driver, load_existing)?;
    if report.table_existed {
        println!("Migration table `{}` already exists.", migrator.table_name());
    } else {
        println!("Created migration table `{}`.", migrator.table_name());
    }
    if load_existing {
        println!(
            "Recorded {} existing migration{} as bootstrapped.",
            report.bootstrapped.len(),
            plural(report.bootstrapped.len())
        );
    }
    Ok(())
}

pub fn drop(
    migrator: &Migrator,
    driver: &mut dyn Driver,
    config: &ConnectionConfig,
    yes: bool,
) -> CommandResult {
    confirm(
        &format!(
            "WARNING: This will drop the migration table `{}` from {}!",
            migrator.table_name(),
            config.location()
        ),
        yes,
    )?;
    migrator.drop_table(driver)?;
    println!("Dropped migration table `{}`.", migrator.table_name());
    Ok(())
}

pub fn list(migrator: &Migrator, driver: &mut dyn Driver, format: OutputFormat) -> CommandResult {
    let records = migrator.list(driver)?;
    if records.is_empty() {
        return Err("No migrations exist.".into());
    }
    println!("{}", format_records(&records, format)?);
    Ok(())
}

pub fn migrate(
    migrator: &Migrator,
    driver: &mut dyn Driver,
    tool: Option<&mut dyn DumpTool>,
    config: &ConnectionConfig,
) -> CommandResult {
    let report = migrator.migrate(driver, tool)?;
    if report.pending.is_empty() {
        println!("No pending migrations in {}.", config.location());
        return Ok(());
    }

    if let Some(ref backup) = report.backup {
        println!("Backed up {} to {}.", config.location(), backup.display());
    }
    match report.recovery {
        Recovery::NotNeeded => println!(
            "Ran {} migration{} in {}.",
            report.migrations_run.len(),
            plural(report.migrations_run.len()),
            config.location()
        ),
        Recovery::NoBackup => eprintln!("No backup was taken; the database was not restored."),
        Recovery::Restored => eprintln!("Restored {} from backup.", config.location()),
        Recovery::RestoreFailed { ref backup, .. } => eprintln!(
            "RESTORE FAILED. The backup is kept at {} for manual recovery.",
            backup.display()
        ),
    }
    if let Some(ref retained) = report.backup_retained {
        eprintln!("Could not remove backup {}.", retained.display());
    }

    report.into_result()?;
    Ok(())
}

pub fn snapshot(
    migrator: &Migrator,
    driver: &mut dyn Driver,
    tool: &mut dyn DumpTool,
    outfile: &Path,
) -> CommandResult {
    let snapshot = migrator.snapshot(driver, tool)?;
    std::fs::write(outfile, snapshot)
        .map_err(|e| format!("cannot write {}: {}", outfile.display(), e))?;
    println!("Wrote snapshot to {}.", outfile.display());
    Ok(())
}

pub fn test(
    migrator: &Migrator,
    driver: &mut dyn Driver,
    tool: &mut dyn DumpTool,
    config: &ConnectionConfig,
    yes: bool,
    current: &Path,
    target: &Path,
) -> CommandResult {
    // both snapshots must be readable before the database is touched
    std::fs::File::open(current)
        .map_err(|e| format!("cannot read {}: {}", current.display(), e))?;
    let target = std::fs::read_to_string(target)
        .map_err(|e| format!("cannot read {}: {}", target.display(), e))?;
    confirm(
        &format!("WARNING: This will drop all objects in {}!", config.location()),
        yes,
    )?;

    println!("Loading current snapshot {}.", current.display());
    let report = migrator.test(driver, tool, current, &target)?;
    println!(
        "Ran {} migration{}.",
        report.migrations_run.len(),
        plural(report.migrations_run.len())
    );

    if let Some(ref comparison) = report.comparison {
        if comparison.identical {
            println!("Test passed: migrated database matches target database!");
        } else {
            eprintln!("Test failed: migrated database differs from target database.");
            print!("{}", comparison.diff);
        }
    }
    report.into_result()?;
    Ok(())
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use sqlmig::sqlite::{SqliteDriver, SqliteDumpTool};
    use sqlmig::MigrationSource;

    #[test]
    fn migrate_then_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir(&migrations).unwrap();
        std::fs::write(migrations.join("1_users.sql"), "CREATE TABLE users (id INTEGER);").unwrap();

        let database = dir.path().join("app.db");
        let config = ConnectionConfig::sqlite(database.to_string_lossy());
        let mut driver = SqliteDriver::open(&database).unwrap();
        let mut tool = SqliteDumpTool::new(&database);
        let migrator = Migrator::new(MigrationSource::new(&migrations)).with_backup_dir(dir.path());

        bootstrap(&migrator, &mut driver, false).unwrap();
        migrate(&migrator, &mut driver, Some(&mut tool), &config).unwrap();
        list(&migrator, &mut driver, OutputFormat::Table).unwrap();

        let outfile = dir.path().join("snapshot.sql");
        snapshot(&migrator, &mut driver, &mut tool, &outfile).unwrap();
        let written = std::fs::read_to_string(&outfile).unwrap();
        assert!(written.contains("CREATE TABLE users"));
        assert!(written.contains("'1_users', 'succeeded'"));
    }

    #[test]
    fn failed_migration_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir(&migrations).unwrap();
        std::fs::write(migrations.join("1_broken.sql"), "BROKEN;").unwrap();

        let database = dir.path().join("app.db");
        let config = ConnectionConfig::sqlite(database.to_string_lossy());
        let mut driver = SqliteDriver::open(&database).unwrap();
        let migrator = Migrator::new(MigrationSource::new(&migrations));

        bootstrap(&migrator, &mut driver, false).unwrap();
        assert!(migrate(&migrator, &mut driver, None, &config).is_err());
    }

    #[test]
    fn list_without_migrations_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("app.db");
        let mut driver = SqliteDriver::open(&database).unwrap();
        let migrator = Migrator::new(MigrationSource::new(dir.path()));

        bootstrap(&migrator, &mut driver, true).unwrap();
        let err = list(&migrator, &mut driver, OutputFormat::Json).unwrap_err();
        assert_eq!(err.to_string(), "No migrations exist.");
    }
}
