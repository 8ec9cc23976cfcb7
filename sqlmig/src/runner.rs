//! The migration runner: plans which migrations are pending and executes them.

use crate::backup::{BackupArtifact, BackupCoordinator};
use crate::core::{
    now, BootstrapReport, Hooks, Migration, MigrationFailure, MigrationRecord, MigrationReport,
    Recovery, DEFAULT_TABLE_NAME,
};
use crate::driver::{Driver, DumpTool};
use crate::error::Error;
use crate::scanner::MigrationSource;
use crate::store::{validate_table_name, MetadataStore};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

/// What a run would do: the persisted records and the migrations still to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Persisted records, in applied order.
    pub applied: Vec<MigrationRecord>,
    /// Migrations on disk with no record, in execution order.
    pub pending: Vec<Migration>,
}

impl Plan {
    /// Applied records followed by pending migrations as `pending` records.
    pub fn records(&self) -> Vec<MigrationRecord> {
        self.applied
            .iter()
            .cloned()
            .chain(
                self.pending
                    .iter()
                    .map(|m| MigrationRecord::pending(m.name())),
            )
            .collect()
    }
}

/// The entrypoint for running the migrations found in a [MigrationSource].
///
/// A migration runs at most once: any name with a row in the metadata table, whatever
/// its status, is never executed again. Pending migrations run one at a time in name
/// order and the run stops at the first failure.
///
/// ## Example
///
/// ```
/// use sqlmig::{MigrationSource, Migrator};
/// use sqlmig::sqlite::{SqliteDriver, SqliteDumpTool};
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::create_dir(dir.path().join("migrations")).unwrap();
/// std::fs::write(
///     dir.path().join("migrations/001_users.sql"),
///     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);",
/// )
/// .unwrap();
/// let database = dir.path().join("app.db");
///
/// let migrator = Migrator::new(MigrationSource::new(dir.path().join("migrations")))
///     .with_backup_dir(dir.path());
/// let mut driver = SqliteDriver::open(&database).unwrap();
/// let mut tool = SqliteDumpTool::new(&database);
///
/// migrator.bootstrap(&mut driver, false).unwrap();
/// let report = migrator.migrate(&mut driver, Some(&mut tool)).unwrap();
/// assert_eq!(report.migrations_run, vec!["001_users"]);
///
/// // nothing left to do the second time
/// let report = migrator.migrate(&mut driver, Some(&mut tool)).unwrap();
/// assert!(report.migrations_run.is_empty());
/// ```
#[derive(Debug)]
pub struct Migrator {
    source: MigrationSource,
    table_name: String,
    backup_dir: Option<PathBuf>,
    hooks: Hooks,
}

impl Migrator {
    pub fn new(source: MigrationSource) -> Self {
        Self {
            source,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            backup_dir: None,
            hooks: Hooks::default(),
        }
    }

    /// Set a custom name for the metadata table.
    /// Defaults to "sqlmig_migrations". Must be a plain SQL identifier.
    pub fn try_with_table_name(mut self, name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        validate_table_name(&name)?;
        self.table_name = name;
        Ok(self)
    }

    /// Directory for backup artifacts. Defaults to the system temp directory.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Set a callback to be invoked when a migration starts.
    /// The callback receives the migration name, its 1-based position, and the batch size.
    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, usize, usize) + Send + Sync + 'static,
    {
        self.hooks.on_migration_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration completes successfully.
    /// The callback receives the migration name and duration.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, std::time::Duration) + Send + Sync + 'static,
    {
        self.hooks.on_migration_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration fails.
    /// The callback receives the migration name and error.
    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &crate::Error) + Send + Sync + 'static,
    {
        self.hooks.on_migration_error = Some(Box::new(callback));
        self
    }

    pub fn source(&self) -> &MigrationSource {
        &self.source
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the metadata table if it is absent.
    ///
    /// With `load_existing`, every migration currently on disk that has no record is
    /// recorded as `bootstrapped`, so a database built by other tooling does not have
    /// them executed again. Without it, they all stay pending.
    pub fn bootstrap(
        &self,
        driver: &mut dyn Driver,
        load_existing: bool,
    ) -> Result<BootstrapReport, Error> {
        // scan first so a bad directory fails before anything is written
        let names = if load_existing {
            self.source.names()?
        } else {
            vec![]
        };

        let mut store = MetadataStore::new(driver, &self.table_name);
        let table_existed = store.ensure_bootstrapped()?;

        let known: HashSet<String> = if table_existed {
            store.load_all()?.into_iter().map(|r| r.name).collect()
        } else {
            HashSet::new()
        };
        let bootstrapped: Vec<String> = names
            .into_iter()
            .filter(|name| !known.contains(name))
            .collect();
        store.insert_as_bootstrapped(&bootstrapped)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            table_existed = table_existed,
            bootstrapped = bootstrapped.len(),
            "Bootstrapped migration table"
        );

        Ok(BootstrapReport {
            table_existed,
            bootstrapped,
        })
    }

    /// Reconcile the migrations on disk with the metadata table.
    pub fn plan(&self, driver: &mut dyn Driver) -> Result<Plan, Error> {
        let scanned = self.source.scan()?;
        let applied = MetadataStore::new(driver, &self.table_name).load_bootstrapped()?;

        let known: HashSet<&str> = applied.iter().map(|r| r.name.as_str()).collect();
        // filtering keeps the scan order
        let pending: Vec<Migration> = scanned
            .into_iter()
            .filter(|m| !known.contains(m.name()))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            applied = applied.len(),
            pending = ?pending.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "Planned migrations"
        );

        Ok(Plan { applied, pending })
    }

    /// Every migration known to the database or on disk: applied records first, then
    /// pending migrations in the order they would run.
    pub fn list(&self, driver: &mut dyn Driver) -> Result<Vec<MigrationRecord>, Error> {
        Ok(self.plan(driver)?.records())
    }

    /// Run every pending migration.
    ///
    /// With a `backup` tool, the database is dumped before the first migration and, if a
    /// migration fails, emptied and restored from that dump. A failed backup stops the
    /// run before anything executes.
    ///
    /// A failing migration does not make this return `Err`; the returned report carries
    /// the failure and what happened to the backup. Use [MigrationReport::into_result]
    /// to turn an aborted run into an error.
    pub fn migrate(
        &self,
        driver: &mut dyn Driver,
        backup: Option<&mut dyn DumpTool>,
    ) -> Result<MigrationReport, Error> {
        let plan = self.plan(driver)?;

        let failed = MetadataStore::new(driver, &self.table_name).failed_names()?;
        if !failed.is_empty() {
            return Err(Error::PreviouslyFailed(failed));
        }

        let mut report = MigrationReport::empty();
        report.pending = plan.pending.iter().map(|m| m.name.clone()).collect();
        if plan.pending.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::info!("No pending migrations");
            return Ok(report);
        }

        let backup_dir = self
            .backup_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let mut coordinator = backup.map(|tool| BackupCoordinator::new(tool, backup_dir));
        let artifact = match coordinator.as_mut() {
            Some(coordinator) => Some(coordinator.create()?),
            None => None,
        };
        report.backup = artifact.as_ref().map(|a| a.path().to_path_buf());

        let (migrations_run, failure) = self.execute(driver, &plan.pending);
        report.migrations_run = migrations_run;

        match (coordinator, artifact) {
            (Some(coordinator), Some(artifact)) => {
                report.recovery = if failure.is_some() {
                    self.recover(coordinator, artifact, &mut report)
                } else {
                    self.cleanup(&coordinator, artifact, &mut report);
                    Recovery::NotNeeded
                };
            }
            _ => {
                if failure.is_some() {
                    report.recovery = Recovery::NoBackup;
                }
            }
        }
        report.failing_migration = failure;

        Ok(report)
    }

    /// Run `pending` in order, stopping at the first failure.
    pub(crate) fn execute(
        &self,
        driver: &mut dyn Driver,
        pending: &[Migration],
    ) -> (Vec<String>, Option<MigrationFailure>) {
        let total = pending.len();
        let mut migrations_run = Vec::new();

        for (index, migration) in pending.iter().enumerate() {
            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!("migration", name = %migration.name()).entered();

            #[cfg(feature = "tracing")]
            tracing::info!("Starting migration");

            self.hooks.migration_started(migration.name(), index + 1, total);
            let migration_start = Instant::now();

            match self.execute_one(driver, migration) {
                Ok(()) => {
                    let duration = migration_start.elapsed();

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        duration_ms = duration.as_millis(),
                        "Migration completed successfully"
                    );

                    self.hooks.migration_completed(migration.name(), duration);
                    migrations_run.push(migration.name.clone());
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %error, "Migration failed");

                    self.hooks.migration_failed(migration.name(), &error);
                    return (
                        migrations_run,
                        Some(MigrationFailure {
                            name: migration.name.clone(),
                            error,
                        }),
                    );
                }
            }
        }

        (migrations_run, None)
    }

    fn execute_one(&self, driver: &mut dyn Driver, migration: &Migration) -> Result<(), Error> {
        MetadataStore::new(driver, &self.table_name).mark_started(migration.name(), now())?;
        driver.execute_script(migration.sql())?;
        MetadataStore::new(driver, &self.table_name).mark_succeeded(migration.name(), now())
    }

    fn recover(
        &self,
        mut coordinator: BackupCoordinator<'_>,
        artifact: BackupArtifact,
        report: &mut MigrationReport,
    ) -> Recovery {
        match coordinator.restore(&artifact) {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Restored from backup");

                self.cleanup(&coordinator, artifact, report);
                Recovery::Restored
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    error = %error,
                    backup = %artifact.path().display(),
                    "Could not restore from backup; the backup has been kept"
                );

                Recovery::RestoreFailed {
                    error,
                    backup: artifact.path().to_path_buf(),
                }
            }
        }
    }

    fn cleanup(
        &self,
        coordinator: &BackupCoordinator<'_>,
        artifact: BackupArtifact,
        report: &mut MigrationReport,
    ) {
        let path = artifact.path().to_path_buf();
        if let Err(_error) = coordinator.discard(artifact) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_error, "Could not remove backup");

            report.backup_retained = Some(path);
        }
    }

    /// Delete the metadata table. Every record of what has run is lost.
    pub fn drop_table(&self, driver: &mut dyn Driver) -> Result<(), Error> {
        let mut store = MetadataStore::new(driver, &self.table_name);
        if !store.exists()? {
            return Err(Error::NotBootstrapped(self.table_name.clone()));
        }
        store.drop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MigrationStatus;
    use crate::testing::{MemoryDatabase, MemoryDriver, MemoryDumpTool};
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    struct Fixture {
        dir: tempfile::TempDir,
        db: Rc<RefCell<MemoryDatabase>>,
        driver: MemoryDriver,
        tool: MemoryDumpTool,
    }

    impl Fixture {
        fn new(migrations: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("migrations")).unwrap();
            std::fs::create_dir_all(dir.path().join("backups")).unwrap();
            let db = MemoryDatabase::shared();
            let fixture = Self {
                dir,
                driver: MemoryDriver::new(db.clone()),
                tool: MemoryDumpTool::new(db.clone()),
                db,
            };
            for (name, sql) in migrations {
                fixture.add(name, sql);
            }
            fixture
        }

        fn add(&self, name: &str, sql: &str) {
            let path = self.dir.path().join("migrations").join(format!("{}.sql", name));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, sql).unwrap();
        }

        fn migrator(&self) -> Migrator {
            Migrator::new(MigrationSource::new(self.dir.path().join("migrations")))
                .with_backup_dir(self.backups())
        }

        fn backups(&self) -> PathBuf {
            self.dir.path().join("backups")
        }

        fn backup_files(&self) -> Vec<PathBuf> {
            std::fs::read_dir(self.backups())
                .unwrap()
                .map(|e| e.unwrap().path())
                .collect()
        }

        fn statuses(&mut self) -> Vec<(String, MigrationStatus)> {
            let mut store = MetadataStore::new(&mut self.driver, DEFAULT_TABLE_NAME);
            let mut records = store.load_all().unwrap();
            records.sort_by(|a, b| a.name.cmp(&b.name));
            records.into_iter().map(|r| (r.name, r.status)).collect()
        }
    }

    fn names(records: &[MigrationRecord]) -> Vec<(&str, MigrationStatus)> {
        records
            .iter()
            .map(|r| (r.name.as_str(), r.status))
            .collect()
    }

    #[test]
    fn runs_pending_in_name_order() {
        let mut f = Fixture::new(&[
            ("2_posts", "CREATE TABLE posts (id INT)"),
            ("1_users", "CREATE TABLE users (id INT)"),
            ("social/friends", "CREATE TABLE friends (a INT, b INT)"),
        ]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();

        let report = migrator.migrate(&mut f.driver, Some(&mut f.tool)).unwrap();
        assert!(report.is_success());
        assert_eq!(report.pending, vec!["1_users", "2_posts", "social/friends"]);
        assert_eq!(
            report.migrations_run,
            vec!["1_users", "2_posts", "social/friends"]
        );
        assert_eq!(report.recovery, Recovery::NotNeeded);
        assert_eq!(
            f.db.borrow().executed[1..],
            [
                "CREATE TABLE users (id INT)",
                "CREATE TABLE posts (id INT)",
                "CREATE TABLE friends (a INT, b INT)"
            ]
        );
        assert_eq!(
            f.statuses(),
            vec![
                ("1_users".to_string(), MigrationStatus::Succeeded),
                ("2_posts".to_string(), MigrationStatus::Succeeded),
                ("social/friends".to_string(), MigrationStatus::Succeeded),
            ]
        );
        // backup taken and then removed
        assert!(report.backup.is_some());
        assert_eq!(f.db.borrow().backups, 1);
        assert!(f.backup_files().is_empty());
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut f = Fixture::new(&[("m1", "CREATE TABLE a (id INT)")]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();
        migrator.migrate(&mut f.driver, Some(&mut f.tool)).unwrap();

        let report = migrator.migrate(&mut f.driver, Some(&mut f.tool)).unwrap();
        assert!(report.is_success());
        assert!(report.pending.is_empty());
        assert!(report.migrations_run.is_empty());
        // nothing to protect, so no second backup
        assert_eq!(report.backup, None);
        assert_eq!(f.db.borrow().backups, 1);
    }

    #[test]
    fn succeeded_migrations_are_never_rerun() {
        let mut f = Fixture::new(&[("m1", "CREATE TABLE a (id INT)")]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();
        migrator.migrate(&mut f.driver, None).unwrap();

        f.add("m1", "CREATE TABLE a (id INT, changed INT)");
        f.add("m2", "CREATE TABLE b (id INT)");
        let report = migrator.migrate(&mut f.driver, None).unwrap();
        assert_eq!(report.migrations_run, vec!["m2"]);
    }

    #[test]
    fn stops_at_first_failure() {
        let mut f = Fixture::new(&[
            ("a", "CREATE TABLE a (id INT)"),
            ("b", "CREATE TABLE b (id INT); BROKEN"),
            ("c", "CREATE TABLE c (id INT)"),
        ]);
        f.db.borrow_mut().fail_on = Some("BROKEN".to_string());
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();

        let report = migrator.migrate(&mut f.driver, None).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.migrations_run, vec!["a"]);
        assert_eq!(report.recovery, Recovery::NoBackup);
        let failure = report.failing_migration.as_ref().unwrap();
        assert_eq!(failure.name(), "b");
        assert!(failure.error().to_string().contains("BROKEN"));

        // a succeeded, b is marked failed, c was never attempted
        assert_eq!(
            f.statuses(),
            vec![
                ("a".to_string(), MigrationStatus::Succeeded),
                ("b".to_string(), MigrationStatus::Failed),
            ]
        );
        assert!(!f.db.borrow().executed.iter().any(|s| s.contains("TABLE c")));
    }

    #[test]
    fn failure_restores_backup_and_removes_it() {
        let mut f = Fixture::new(&[
            ("a", "CREATE TABLE a (id INT)"),
            ("b", "BROKEN"),
        ]);
        f.db.borrow_mut().fail_on = Some("BROKEN".to_string());
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();

        let report = migrator.migrate(&mut f.driver, Some(&mut f.tool)).unwrap();
        assert_eq!(report.recovery, Recovery::Restored);
        assert_eq!(report.migrations_run, vec!["a"]);
        assert_eq!(f.db.borrow().restores, 1);
        // restored to the state before the run: no table a, no records
        assert!(!f.driver.table_exists("a").unwrap());
        assert!(f.statuses().is_empty());
        assert!(f.backup_files().is_empty());
        assert!(!report.backup.as_ref().unwrap().exists());

        assert_eq!(
            report.into_result().unwrap_err(),
            Error::Migration {
                name: "b".to_string(),
                source: Box::new(Error::Generic("syntax error near \"BROKEN\"".to_string())),
                restored: true,
            }
        );
    }

    #[test]
    fn failed_restore_keeps_backup() {
        let mut f = Fixture::new(&[("a", "BROKEN")]);
        f.db.borrow_mut().fail_on = Some("BROKEN".to_string());
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();

        let errors_seen = Arc::new(Mutex::new(Vec::new()));
        let seen = errors_seen.clone();
        let migrator = migrator.on_migration_error(move |name, _| {
            seen.lock().unwrap().push(name.to_string());
        });
        // the backup succeeds, but restoring it will not
        let db = f.db.clone();
        let mut tool = FailAfterBackup {
            inner: MemoryDumpTool::new(db.clone()),
            db,
        };

        let report = migrator.migrate(&mut f.driver, Some(&mut tool)).unwrap();
        let backup = report.backup.clone().unwrap();
        assert!(matches!(
            report.recovery,
            Recovery::RestoreFailed { backup: ref kept, .. } if *kept == backup
        ));
        assert!(backup.exists());
        assert_eq!(f.backup_files(), vec![backup.clone()]);
        assert_eq!(*errors_seen.lock().unwrap(), vec!["a"]);

        let error = report.into_result().unwrap_err();
        assert!(matches!(error, Error::Restore { ref name, .. } if name == "a"));
    }

    /// Backs up normally, then refuses to restore.
    struct FailAfterBackup {
        inner: MemoryDumpTool,
        db: Rc<RefCell<MemoryDatabase>>,
    }

    impl DumpTool for FailAfterBackup {
        fn backup(&mut self, dest: &Path) -> Result<(), Error> {
            self.inner.backup(dest)?;
            self.db.borrow_mut().fail_restore = true;
            Ok(())
        }
        fn restore(&mut self, src: &Path) -> Result<(), Error> {
            self.inner.restore(src)
        }
        fn snapshot(&mut self) -> Result<String, Error> {
            self.inner.snapshot()
        }
        fn drop_and_recreate(&mut self) -> Result<(), Error> {
            self.inner.drop_and_recreate()
        }
    }

    #[test]
    fn failed_backup_runs_nothing() {
        let mut f = Fixture::new(&[("a", "CREATE TABLE a (id INT)")]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();
        f.db.borrow_mut().fail_backup = true;

        let error = migrator
            .migrate(&mut f.driver, Some(&mut f.tool))
            .unwrap_err();
        assert!(matches!(error, Error::Backup(_)));
        assert!(f.statuses().is_empty());
        assert!(!f.driver.table_exists("a").unwrap());
        assert!(f.backup_files().is_empty());
    }

    #[test]
    fn previously_failed_migrations_block_the_run() {
        let mut f = Fixture::new(&[("a", "BROKEN"), ("b", "CREATE TABLE b (id INT)")]);
        f.db.borrow_mut().fail_on = Some("BROKEN".to_string());
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();
        migrator.migrate(&mut f.driver, None).unwrap();

        f.db.borrow_mut().fail_on = None;
        let error = migrator
            .migrate(&mut f.driver, Some(&mut f.tool))
            .unwrap_err();
        assert_eq!(error, Error::PreviouslyFailed(vec!["a".to_string()]));
        assert_eq!(f.db.borrow().backups, 0);
    }

    #[test]
    fn empty_migration_succeeds() {
        let mut f = Fixture::new(&[("noop", "")]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();

        let report = migrator.migrate(&mut f.driver, None).unwrap();
        assert_eq!(report.migrations_run, vec!["noop"]);
        assert_eq!(
            f.statuses(),
            vec![("noop".to_string(), MigrationStatus::Succeeded)]
        );
    }

    #[test]
    fn bootstrap_with_load_existing_marks_everything_applied() {
        let mut f = Fixture::new(&[("m1", "CREATE TABLE a (id INT)"), ("m2", "CREATE TABLE b (id INT)")]);
        let migrator = f.migrator();

        let report = migrator.bootstrap(&mut f.driver, true).unwrap();
        assert_eq!(
            report,
            BootstrapReport {
                table_existed: false,
                bootstrapped: vec!["m1".to_string(), "m2".to_string()],
            }
        );
        assert_eq!(
            f.statuses(),
            vec![
                ("m1".to_string(), MigrationStatus::Bootstrapped),
                ("m2".to_string(), MigrationStatus::Bootstrapped),
            ]
        );

        let report = migrator.migrate(&mut f.driver, Some(&mut f.tool)).unwrap();
        assert!(report.migrations_run.is_empty());
    }

    #[test]
    fn bootstrap_without_load_existing_leaves_everything_pending() {
        let mut f = Fixture::new(&[("m2", "CREATE TABLE b (id INT)"), ("m1", "CREATE TABLE a (id INT)")]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();

        assert_eq!(
            names(&migrator.list(&mut f.driver).unwrap()),
            vec![
                ("m1", MigrationStatus::Pending),
                ("m2", MigrationStatus::Pending)
            ]
        );
        let report = migrator.migrate(&mut f.driver, None).unwrap();
        assert_eq!(report.migrations_run, vec!["m1", "m2"]);
    }

    #[test]
    fn bootstrap_twice_only_adds_new_names() {
        let mut f = Fixture::new(&[("m1", "")]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, true).unwrap();

        f.add("m2", "");
        let report = migrator.bootstrap(&mut f.driver, true).unwrap();
        assert_eq!(
            report,
            BootstrapReport {
                table_existed: true,
                bootstrapped: vec!["m2".to_string()],
            }
        );
    }

    #[test]
    fn list_shows_applied_then_pending() {
        let mut f = Fixture::new(&[("m1", ""), ("m2", "")]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, false).unwrap();
        f.add("m0", "");
        // m0 sorts first, so it runs ahead of m1 and m2
        let report = migrator.migrate(&mut f.driver, None).unwrap();
        assert_eq!(report.migrations_run, vec!["m0", "m1", "m2"]);
        f.add("m3", "");
        f.add("a_first_by_name", "");

        let records = migrator.list(&mut f.driver).unwrap();
        assert_eq!(
            names(&records),
            vec![
                ("m0", MigrationStatus::Succeeded),
                ("m1", MigrationStatus::Succeeded),
                ("m2", MigrationStatus::Succeeded),
                ("a_first_by_name", MigrationStatus::Pending),
                ("m3", MigrationStatus::Pending),
            ]
        );
        assert!(records[3].started_at.is_none());
    }

    #[test]
    fn migrate_requires_bootstrap() {
        let mut f = Fixture::new(&[("m1", "")]);
        let error = f.migrator().migrate(&mut f.driver, None).unwrap_err();
        assert_eq!(
            error,
            Error::NotBootstrapped(DEFAULT_TABLE_NAME.to_string())
        );
    }

    #[test]
    fn missing_directory_fails_before_database_contact() {
        let mut f = Fixture::new(&[]);
        let migrator = Migrator::new(MigrationSource::new(f.dir.path().join("missing")));
        assert!(matches!(
            migrator.bootstrap(&mut f.driver, true),
            Err(Error::Configuration(_))
        ));
        assert!(!f.driver.table_exists(DEFAULT_TABLE_NAME).unwrap());
    }

    #[test]
    fn hooks_see_every_migration() {
        let mut f = Fixture::new(&[("a", ""), ("b", "")]);
        let started = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(Mutex::new(Vec::new()));
        let (s, c) = (started.clone(), completed.clone());
        let migrator = f
            .migrator()
            .on_migration_start(move |name, index, total| {
                s.lock().unwrap().push(format!("{} {}/{}", name, index, total))
            })
            .on_migration_complete(move |name, _| c.lock().unwrap().push(name.to_string()));
        migrator.bootstrap(&mut f.driver, false).unwrap();
        migrator.migrate(&mut f.driver, None).unwrap();

        assert_eq!(*started.lock().unwrap(), vec!["a 1/2", "b 2/2"]);
        assert_eq!(*completed.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn drop_table_forgets_history() {
        let mut f = Fixture::new(&[("m1", "")]);
        let migrator = f.migrator();
        migrator.bootstrap(&mut f.driver, true).unwrap();
        migrator.drop_table(&mut f.driver).unwrap();

        assert!(!f.driver.table_exists(DEFAULT_TABLE_NAME).unwrap());
        assert!(matches!(
            migrator.drop_table(&mut f.driver),
            Err(Error::NotBootstrapped(_))
        ));
    }

    #[test]
    fn custom_table_name() {
        let mut f = Fixture::new(&[("m1", "")]);
        let migrator = f.migrator().try_with_table_name("schema_history").unwrap();
        migrator.bootstrap(&mut f.driver, true).unwrap();
        assert!(f.driver.table_exists("schema_history").unwrap());
        assert!(!f.driver.table_exists(DEFAULT_TABLE_NAME).unwrap());

        assert!(f.migrator().try_with_table_name("bad name").is_err());
    }
}
