//! SQLite support, in process through `rusqlite`.
//!
//! [SqliteDriver] runs scripts with `execute_batch`, so a migration file may hold any
//! number of statements. [SqliteDumpTool] needs no external binaries: backups use SQLite's
//! online backup API and snapshots are read from `sqlite_master`.
//!
//! # Example
//!
//! ```
//! use sqlmig::sqlite::{SqliteDriver, SqliteDumpTool};
//! use sqlmig::{MigrationSource, Migrator};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let migrations = dir.path().join("migrations");
//! std::fs::create_dir_all(migrations.join("social")).unwrap();
//! std::fs::write(
//!     migrations.join("001_users.sql"),
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);",
//! )
//! .unwrap();
//! std::fs::write(
//!     migrations.join("social/add_friends_join_table.sql"),
//!     "CREATE TABLE friends (a INTEGER REFERENCES users (id), b INTEGER REFERENCES users (id));
//!      CREATE INDEX friends_b ON friends (b);",
//! )
//! .unwrap();
//!
//! let database = dir.path().join("app.db");
//! let mut driver = SqliteDriver::open(&database).unwrap();
//! let mut tool = SqliteDumpTool::new(&database);
//!
//! let migrator = Migrator::new(MigrationSource::new(&migrations)).with_backup_dir(dir.path());
//! migrator.bootstrap(&mut driver, false).unwrap();
//! let report = migrator.migrate(&mut driver, Some(&mut tool)).unwrap();
//! assert_eq!(
//!     report.migrations_run,
//!     vec!["001_users", "social/add_friends_join_table"]
//! );
//! ```

use crate::core::{format_timestamp, parse_timestamp, MigrationRecord, MigrationStatus, Timestamp};
use crate::driver::{Driver, DumpTool};
use crate::error::Error;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Every database file starts with this header.
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

fn open(path: &Path, busy_timeout: Duration) -> Result<Connection, Error> {
    let conn = Connection::open(path).map_err(|e| {
        Error::Connection(format!("cannot open sqlite database {}: {}", path.display(), e))
    })?;
    // wait on a locked database instead of failing immediately
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

/// A [Driver] over a `rusqlite` connection.
pub struct SqliteDriver {
    conn: Connection,
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteDriver {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self {
            conn: open(path.as_ref(), DEFAULT_BUSY_TIMEOUT)?,
        })
    }

    /// Wrap a connection opened elsewhere.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Driver for SqliteDriver {
    fn execute_script(&mut self, sql: &str) -> Result<(), Error> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        let exists = stmt.query([table])?.next()?.is_some();
        Ok(exists)
    }

    fn select_records(&mut self, table: &str) -> Result<Vec<MigrationRecord>, Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, status, started_at, completed_at FROM {}",
            table
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, status, started_at, completed_at)| {
                Ok(MigrationRecord {
                    name,
                    status: status.parse()?,
                    started_at: started_at.as_deref().map(parse_timestamp).transpose()?,
                    completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
                })
            })
            .collect()
    }

    fn insert_record(&mut self, table: &str, record: &MigrationRecord) -> Result<(), Error> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (name, status, started_at, completed_at) VALUES (?1, ?2, ?3, ?4)",
                table
            ),
            params![
                record.name,
                record.status.as_str(),
                record.started_at.as_ref().map(format_timestamp),
                record.completed_at.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    fn update_record(
        &mut self,
        table: &str,
        name: &str,
        status: MigrationStatus,
        completed_at: Option<Timestamp>,
    ) -> Result<(), Error> {
        self.conn.execute(
            &format!(
                "UPDATE {} SET status = ?1, completed_at = ?2 WHERE name = ?3",
                table
            ),
            params![
                status.as_str(),
                completed_at.as_ref().map(format_timestamp),
                name
            ],
        )?;
        Ok(())
    }
}

/// A [DumpTool] for a SQLite database file.
///
/// Backups are binary database images. [DumpTool::restore] also accepts a text snapshot,
/// which is replayed as SQL.
#[derive(Debug, Clone)]
pub struct SqliteDumpTool {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteDumpTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Set how long to wait for a locked database. Defaults to 30 seconds.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect(&self) -> Result<Connection, Error> {
        open(&self.path, self.busy_timeout)
    }
}

fn is_database_image(path: &Path) -> Result<bool, Error> {
    let mut file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut header = [0u8; 16];
    match file.read_exact(&mut header) {
        Ok(()) => Ok(&header == SQLITE_HEADER),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl DumpTool for SqliteDumpTool {
    fn backup(&mut self, dest: &Path) -> Result<(), Error> {
        self.connect()?
            .backup(DatabaseName::Main, dest, None)
            .map_err(Error::from)
    }

    fn restore(&mut self, src: &Path) -> Result<(), Error> {
        let mut conn = self.connect()?;
        if is_database_image(src)? {
            conn.restore(
                DatabaseName::Main,
                src,
                None::<fn(rusqlite::backup::Progress)>,
            )?;
        } else {
            let sql = std::fs::read_to_string(src).map_err(|e| Error::io(src, e))?;
            conn.execute_batch(&sql)?;
        }
        Ok(())
    }

    fn snapshot(&mut self) -> Result<String, Error> {
        let conn = self.connect()?;
        // tables before the indexes, views and triggers that refer to them
        let mut stmt = conn.prepare(
            "SELECT sql FROM sqlite_master
              WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%'
              ORDER BY CASE type
                         WHEN 'table' THEN 0
                         WHEN 'index' THEN 1
                         WHEN 'view' THEN 2
                         ELSE 3
                       END, name",
        )?;
        let statements = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(statements.iter().map(|sql| format!("{};\n", sql)).collect())
    }

    fn drop_and_recreate(&mut self) -> Result<(), Error> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA foreign_keys = OFF")?;

        let mut stmt = conn.prepare(
            "SELECT type, name FROM sqlite_master
              WHERE type IN ('view', 'trigger', 'table') AND name NOT LIKE 'sqlite_%'
              ORDER BY CASE type WHEN 'trigger' THEN 0 WHEN 'view' THEN 1 ELSE 2 END",
        )?;
        let objects = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        for (kind, name) in objects {
            #[cfg(feature = "tracing")]
            tracing::debug!(kind = %kind, name = %name, "Dropping");

            // triggers go away with their table, so one may already be gone
            let exists: Option<String> = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = ?1 AND name = ?2",
                    [&kind, &name],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                conn.execute_batch(&format!(
                    "DROP {} {}",
                    kind.to_uppercase(),
                    quote_identifier(&name)
                ))?;
            }
        }
        Ok(())
    }
}
