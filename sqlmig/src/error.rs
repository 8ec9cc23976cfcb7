use std::path::PathBuf;

/// Error type for the sqlmig crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration, detected before touching the database.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot connect to database: {0}")]
    Connection(String),
    #[error("migration table `{0}` does not exist; run `bootstrap` first")]
    NotBootstrapped(String),
    #[error("cannot run due to previously failed migrations: {}", .0.join(", "))]
    PreviouslyFailed(Vec<String>),
    #[error("cannot create backup: {0}")]
    Backup(Box<Error>),
    #[error(
        "migration `{name}` failed: {source}{}",
        .restored.then_some(" (database restored from backup)").unwrap_or("")
    )]
    Migration {
        name: String,
        source: Box<Error>,
        restored: bool,
    },
    /// The most severe outcome: the batch failed and the database could not be put back.
    #[error(
        "migration `{name}` failed: {source}; restoring from backup also failed: {restore}; \
        the backup was kept at {} for manual recovery",
        .backup.display()
    )]
    Restore {
        name: String,
        source: Box<Error>,
        restore: Box<Error>,
        backup: PathBuf,
    },
    #[error("migrated database differs from target snapshot:\n{diff}")]
    ComparisonMismatch { diff: String },
    #[error("external tool `{program}` failed ({status}): {stderr}")]
    Tool {
        program: String,
        status: String,
        stderr: String,
    },
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[error("{0}")]
    Generic(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

// Manual PartialEq implementation because io::Error and postgres::Error don't implement PartialEq
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.to_string() == other.to_string()
    }
}
