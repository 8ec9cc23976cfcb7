#![cfg_attr(docsrs, feature(doc_cfg))]
//! `sqlmig` applies ordered SQL migration scripts to a database and records which ones
//! have run in a table inside that same database.
//!
//! Core concepts:
//! - A migration is a `.sql` file under a migrations directory. Its name is its path
//!   relative to that directory without the extension, e.g. `social/add_friends_join_table`.
//! - Migrations run in name order, at most once each. A name with a row in the metadata
//!   table is never executed again.
//! - A run stops at the first failing migration. With a backup enabled, the database is
//!   dumped before the run and restored if anything fails.
//!
//! # Example
//!
//! ```
//! use sqlmig::sqlite::{SqliteDriver, SqliteDumpTool};
//! use sqlmig::{MigrationSource, MigrationStatus, Migrator};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let migrations = dir.path().join("migrations");
//! std::fs::create_dir(&migrations).unwrap();
//! std::fs::write(migrations.join("1_users.sql"), "CREATE TABLE users (id INTEGER PRIMARY KEY);").unwrap();
//!
//! let database = dir.path().join("app.db");
//! let mut driver = SqliteDriver::open(&database).unwrap();
//! let mut tool = SqliteDumpTool::new(&database);
//! let migrator = Migrator::new(MigrationSource::new(&migrations)).with_backup_dir(dir.path());
//!
//! // create the metadata table without marking anything as applied
//! migrator.bootstrap(&mut driver, false).unwrap();
//! assert_eq!(migrator.list(&mut driver).unwrap()[0].status, MigrationStatus::Pending);
//!
//! // run it, with a backup taken first
//! let report = migrator.migrate(&mut driver, Some(&mut tool)).unwrap();
//! assert_eq!(report.migrations_run, vec!["1_users"]);
//! assert_eq!(migrator.list(&mut driver).unwrap()[0].status, MigrationStatus::Succeeded);
//! ```
//!
//! # Adopting an existing database
//!
//! If the database was built by other tooling, `bootstrap(driver, true)` records every
//! migration currently on disk as `bootstrapped` so none of them run. Only migrations
//! added afterwards are pending.
//!
//! # Snapshot testing
//!
//! [Migrator::snapshot] dumps the structure of a database along with the set of applied
//! migrations. [Migrator::test] loads a "current" snapshot into a scratch database, runs
//! the pending migrations and compares the result against a "target" snapshot, to check
//! that `current + migrations = target`.
//!
//! # Database support
//!
//! - [`SQLite`](sqlite) - available with the `sqlite` feature flag (on by default).
//! - [`MySQL`](mysql) - available with the `mysql` feature flag.
//! - [`PostgreSQL`](postgres) - available with the `postgres` feature flag.
//!
//! Other databases can be supported by implementing [Driver] and [DumpTool].
//!
//! # Feature flags
//!
//! - `tracing` - log planning, backups and each migration through `tracing`.
//! - `testing` - in-memory collaborators in [testing] for exercising code built on this crate.
//!
//! # Concurrency
//!
//! No lock is taken on the metadata table. Two processes migrating the same database at
//! once may interleave; the primary key on the migration name only prevents both from
//! running the same migration.

mod backup;
pub use backup::{BackupArtifact, BackupCoordinator};

mod compare;
pub use compare::{Comparator, Comparison};

pub mod config;
pub use config::{ConnectionConfig, DatabaseKind};

mod core;
pub use core::{
    BootstrapReport, Migration, MigrationFailure, MigrationRecord, MigrationReport,
    MigrationStatus, Recovery, Timestamp,
};

mod driver;
pub use driver::{Driver, DumpTool};

mod error;
pub use error::Error;

mod runner;
pub use runner::{Migrator, Plan};

mod scanner;
pub use scanner::{compare_names, MigrationSource, DEFAULT_EXTENSION};

mod snapshot;
pub use snapshot::TestReport;

mod store;
pub use store::MetadataStore;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(all(test, feature = "mysql"))]
pub(crate) mod test_mysql;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;

/// The name of the metadata table unless configured otherwise.
pub const DEFAULT_TABLE_NAME: &str = core::DEFAULT_TABLE_NAME;
