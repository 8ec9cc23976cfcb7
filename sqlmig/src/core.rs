use crate::error::Error;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timestamps are stored without a time zone, always in UTC.
pub type Timestamp = NaiveDateTime;

pub(crate) const DEFAULT_TABLE_NAME: &str = "sqlmig_migrations";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Current time as stored in the metadata table.
pub(crate) fn now() -> Timestamp {
    chrono::Utc::now().naive_utc()
}

pub(crate) fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an ISO SQL timestamp, with or without fractional seconds.
pub(crate) fn parse_timestamp(value: &str) -> Result<Timestamp, Error> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| Error::Generic(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// The state of a migration as seen by the engine.
///
/// Only `Bootstrapped`, `Succeeded` and `Failed` are ever written to the metadata table.
/// `Pending` is derived: the migration exists on disk but has no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Bootstrapped,
    Pending,
    Succeeded,
    Failed,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrapped => "bootstrapped",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MigrationStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bootstrapped" => Ok(Self::Bootstrapped),
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Generic(format!(
                "Invalid migration status: \"{}\"",
                other
            ))),
        }
    }
}

/// One row of the metadata table (or a virtual `pending` entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub name: String,
    pub status: MigrationStatus,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl MigrationRecord {
    pub(crate) fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: MigrationStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }
}

/// A migration script discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) sql: String,
}

impl Migration {
    /// The path relative to the migrations root, without extension, using `/` separators.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the script was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw script. May hold several statements, or none.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Represents a failure during a migration run.
#[derive(Debug, PartialEq)]
pub struct MigrationFailure {
    pub(crate) name: String,
    pub(crate) error: Error,
}

impl MigrationFailure {
    /// Name of the migration that was executing when the run stopped.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the error that caused the migration to fail.
    pub fn error(&self) -> &Error {
        &self.error
    }
}

/// What happened to the database after a run stopped on a failing migration.
#[derive(Debug, PartialEq)]
pub enum Recovery {
    /// Nothing failed.
    NotNeeded,
    /// No backup was taken, so the database is left as the failing migration left it.
    NoBackup,
    /// The backup was replayed and then discarded.
    Restored,
    /// Replaying the backup failed. The artifact is left on disk.
    RestoreFailed { error: Error, backup: PathBuf },
}

/// A report of actions performed by [Migrator::migrate](crate::Migrator::migrate).
#[derive(Debug, PartialEq)]
pub struct MigrationReport {
    /// Names that were pending when the run was planned, in execution order.
    pub pending: Vec<String>,
    /// Names that completed in this run, in execution order.
    pub migrations_run: Vec<String>,
    pub failing_migration: Option<MigrationFailure>,
    pub recovery: Recovery,
    /// Location of the backup artifact if one was taken.
    pub backup: Option<PathBuf>,
    /// Set when the artifact should have been removed but could not be.
    pub backup_retained: Option<PathBuf>,
}

impl MigrationReport {
    pub(crate) fn empty() -> Self {
        Self {
            pending: vec![],
            migrations_run: vec![],
            failing_migration: None,
            recovery: Recovery::NotNeeded,
            backup: None,
            backup_retained: None,
        }
    }

    /// True when every pending migration ran.
    pub fn is_success(&self) -> bool {
        self.failing_migration.is_none()
    }

    /// Convert an aborted run into an [Error], keeping successful reports as-is.
    pub fn into_result(self) -> Result<Self, Error> {
        let MigrationReport {
            pending,
            migrations_run,
            failing_migration,
            recovery,
            backup,
            backup_retained,
        } = self;
        let Some(failure) = failing_migration else {
            return Ok(MigrationReport {
                pending,
                migrations_run,
                failing_migration: None,
                recovery,
                backup,
                backup_retained,
            });
        };
        match recovery {
            Recovery::RestoreFailed { error, backup } => Err(Error::Restore {
                name: failure.name,
                source: Box::new(failure.error),
                restore: Box::new(error),
                backup,
            }),
            recovery => Err(Error::Migration {
                name: failure.name,
                source: Box::new(failure.error),
                restored: recovery == Recovery::Restored,
            }),
        }
    }
}

/// Result of [Migrator::bootstrap](crate::Migrator::bootstrap).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub table_existed: bool,
    /// Names recorded as `bootstrapped` by this call.
    pub bootstrapped: Vec<String>,
}

type StartHook = Box<dyn Fn(&str, usize, usize) + Send + Sync>;
type CompleteHook = Box<dyn Fn(&str, Duration) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str, &Error) + Send + Sync>;

/// Observability callbacks invoked by the runner.
#[derive(Default)]
pub(crate) struct Hooks {
    pub on_migration_start: Option<StartHook>,
    pub on_migration_complete: Option<CompleteHook>,
    pub on_migration_error: Option<ErrorHook>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_migration_start", &self.on_migration_start.is_some())
            .field(
                "on_migration_complete",
                &self.on_migration_complete.is_some(),
            )
            .field("on_migration_error", &self.on_migration_error.is_some())
            .finish()
    }
}

impl Hooks {
    pub fn migration_started(&self, name: &str, index: usize, total: usize) {
        if let Some(ref callback) = self.on_migration_start {
            callback(name, index, total);
        }
    }

    pub fn migration_completed(&self, name: &str, duration: Duration) {
        if let Some(ref callback) = self.on_migration_complete {
            callback(name, duration);
        }
    }

    pub fn migration_failed(&self, name: &str, error: &Error) {
        if let Some(ref callback) = self.on_migration_error {
            callback(name, error);
        }
    }
}
