//! The two seams between the engine and a concrete database.
//!
//! A [Driver] owns a live connection and speaks SQL. A [DumpTool] produces and replays
//! whole-database dumps, which for most vendors means spawning the vendor's own client
//! binaries. Both are injected into the [Migrator](crate::Migrator), so the engine never
//! builds connection strings or spawns processes itself.

use crate::core::{MigrationRecord, MigrationStatus, Timestamp};
use crate::error::Error;
use std::path::Path;

/// A connection to the managed database.
///
/// Every call must be durable when it returns: connections run in autocommit mode and
/// nothing is buffered client-side.
pub trait Driver {
    /// Execute a script that may hold any number of statements, including none.
    fn execute_script(&mut self, sql: &str) -> Result<(), Error>;

    /// Whether `table` exists in the current database or schema.
    fn table_exists(&mut self, table: &str) -> Result<bool, Error>;

    /// Read every row of the metadata table.
    fn select_records(&mut self, table: &str) -> Result<Vec<MigrationRecord>, Error>;

    /// Insert one row into the metadata table. Fails if the name is already present.
    fn insert_record(&mut self, table: &str, record: &MigrationRecord) -> Result<(), Error>;

    /// Set the status and completion time of an existing row.
    fn update_record(
        &mut self,
        table: &str,
        name: &str,
        status: MigrationStatus,
        completed_at: Option<Timestamp>,
    ) -> Result<(), Error>;
}

/// Produces and replays database dumps.
pub trait DumpTool {
    /// Write a dump of structure and data to `dest`, suitable for [DumpTool::restore].
    fn backup(&mut self, dest: &Path) -> Result<(), Error>;

    /// Replay a file written by [DumpTool::backup] or a structural snapshot.
    fn restore(&mut self, src: &Path) -> Result<(), Error>;

    /// Dump the structure only, with no data. Two databases with the same structure must
    /// produce byte-identical output.
    fn snapshot(&mut self) -> Result<String, Error>;

    /// Remove every object from the database, leaving it empty.
    fn drop_and_recreate(&mut self) -> Result<(), Error>;

    /// Statement placed ahead of the metadata inserts appended to a snapshot, for dump
    /// formats that leave the session in an unusable state (e.g. an empty search path).
    fn session_preamble(&self) -> Option<String> {
        None
    }
}

#[cfg(any(feature = "mysql", feature = "postgres"))]
pub(crate) mod process {
    //! Running vendor client binaries.

    use crate::error::Error;
    use std::fs::File;
    use std::path::Path;
    use std::process::{Command, Stdio};

    /// Where the tool's standard output should go.
    pub enum Output<'a> {
        File(&'a Path),
        Capture,
        Discard,
    }

    /// Run `command` to completion, optionally feeding it a file on stdin.
    /// Returns captured stdout for [Output::Capture], otherwise an empty buffer.
    pub fn run(
        mut command: Command,
        input: Option<&Path>,
        output: Output<'_>,
    ) -> Result<Vec<u8>, Error> {
        let program = command.get_program().to_string_lossy().into_owned();

        match input {
            Some(path) => {
                let file = File::open(path).map_err(|e| Error::io(path, e))?;
                command.stdin(Stdio::from(file));
            }
            None => {
                command.stdin(Stdio::null());
            }
        }
        match output {
            Output::File(path) => {
                let file = File::create(path).map_err(|e| Error::io(path, e))?;
                command.stdout(Stdio::from(file));
            }
            Output::Capture => {
                command.stdout(Stdio::piped());
            }
            Output::Discard => {
                command.stdout(Stdio::null());
            }
        }
        command.stderr(Stdio::piped());

        #[cfg(feature = "tracing")]
        tracing::debug!(program = %program, "Running external tool");

        let result = command
            .output()
            .map_err(|e| Error::io(program.clone(), e))?;

        if !result.status.success() {
            return Err(Error::Tool {
                program,
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(result.stdout)
    }
}
