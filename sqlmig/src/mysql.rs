//! MySQL support.
//!
//! [MysqlDriver] talks to the server through the `mysql` crate. [MysqlDumpTool] shells out
//! to the `mysqldump` and `mysql` client binaries, which must be on `PATH`; the password
//! is passed through `MYSQL_PWD` rather than the command line.

use crate::config::{ConnectionConfig, DatabaseKind};
use crate::core::{format_timestamp, parse_timestamp, MigrationRecord, MigrationStatus, Timestamp};
use crate::driver::process::{self, Output};
use crate::driver::{Driver, DumpTool};
use crate::error::Error;
use mysql::prelude::*;
use mysql::{Conn, OptsBuilder};
use std::path::Path;
use std::process::Command;

/// A [Driver] over a single MySQL connection in autocommit mode.
pub struct MysqlDriver {
    conn: Conn,
}

impl std::fmt::Debug for MysqlDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlDriver")
            .field("connection_id", &self.conn.connection_id())
            .finish()
    }
}

impl MysqlDriver {
    pub fn connect(config: &ConnectionConfig) -> Result<Self, Error> {
        if config.kind != DatabaseKind::Mysql {
            return Err(Error::Configuration(format!(
                "expected a mysql configuration, got {}",
                config.kind
            )));
        }
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host()))
            .tcp_port(config.port().unwrap_or(3306))
            .user(config.user.as_deref())
            .pass(config.password.as_deref())
            .db_name(Some(&config.database));
        let conn = Conn::new(opts).map_err(|e| {
            Error::Connection(format!("cannot connect to {}: {}", config.location(), e))
        })?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Conn) -> Self {
        Self { conn }
    }

    pub fn connection(&mut self) -> &mut Conn {
        &mut self.conn
    }
}

impl Driver for MysqlDriver {
    fn execute_script(&mut self, sql: &str) -> Result<(), Error> {
        // the server rejects an empty query
        if sql.trim().is_empty() {
            return Ok(());
        }
        // an error in any statement surfaces while draining its result set
        let mut result = self.conn.query_iter(sql)?;
        while let Some(result_set) = result.iter() {
            for row in result_set {
                row?;
            }
        }
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        let count: Option<u64> = self.conn.exec_first(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?",
            (table,),
        )?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn select_records(&mut self, table: &str) -> Result<Vec<MigrationRecord>, Error> {
        // read timestamps as text so no session time zone conversion applies
        let rows: Vec<(String, String, Option<String>, Option<String>)> = self.conn.query(format!(
            "SELECT name, status, CAST(started_at AS CHAR), CAST(completed_at AS CHAR) FROM {}",
            table
        ))?;
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
        self.conn.exec_drop(
            format!(
                "INSERT INTO {} (name, status, started_at, completed_at) VALUES (?, ?, ?, ?)",
                table
            ),
            (
                record.name.as_str(),
                record.status.as_str(),
                record.started_at.as_ref().map(format_timestamp),
                record.completed_at.as_ref().map(format_timestamp),
            ),
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
        self.conn.exec_drop(
            format!(
                "UPDATE {} SET status = ?, completed_at = ? WHERE name = ?",
                table
            ),
            (
                status.as_str(),
                completed_at.as_ref().map(format_timestamp),
                name,
            ),
        )?;
        Ok(())
    }
}

/// A [DumpTool] driving `mysqldump` and `mysql`.
#[derive(Debug, Clone)]
pub struct MysqlDumpTool {
    config: ConnectionConfig,
}

impl MysqlDumpTool {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    fn command(&self, program: &str) -> Command {
        let mut command = Command::new(program);
        command.arg("-h").arg(self.config.host());
        if let Some(ref user) = self.config.user {
            command.arg("-u").arg(user);
        }
        if let Some(port) = self.config.port {
            command.arg("-P").arg(port.to_string());
        }
        if let Some(ref password) = self.config.password {
            command.env("MYSQL_PWD", password);
        }
        command
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

impl DumpTool for MysqlDumpTool {
    fn backup(&mut self, dest: &Path) -> Result<(), Error> {
        let mut command = self.command("mysqldump");
        command.arg(&self.config.database);
        process::run(command, None, Output::File(dest))?;
        Ok(())
    }

    fn restore(&mut self, src: &Path) -> Result<(), Error> {
        let mut command = self.command("mysql");
        command.arg(&self.config.database);
        process::run(command, Some(src), Output::Discard)?;
        Ok(())
    }

    fn snapshot(&mut self) -> Result<String, Error> {
        let mut command = self.command("mysqldump");
        command
            .args(["--no-create-db", "--no-data", "--compact", "--skip-comments"])
            .arg(&self.config.database);
        let stdout = process::run(command, None, Output::Capture)?;
        String::from_utf8(stdout)
            .map_err(|e| Error::Generic(format!("mysqldump produced invalid UTF-8: {}", e)))
    }

    fn drop_and_recreate(&mut self) -> Result<(), Error> {
        let mut driver = MysqlDriver::connect(&self.config)?;
        let conn = driver.connection();
        // session scoped, so dropping in any order is fine
        conn.query_drop("SET FOREIGN_KEY_CHECKS = 0")?;

        let objects: Vec<(String, String)> = conn.query(
            "SELECT table_name, table_type FROM information_schema.tables
              WHERE table_schema = DATABASE()
              ORDER BY table_type = 'VIEW' DESC, table_name",
        )?;
        for (name, kind) in objects {
            let keyword = if kind == "VIEW" { "VIEW" } else { "TABLE" };

            #[cfg(feature = "tracing")]
            tracing::debug!(kind = %keyword, name = %name, "Dropping");

            conn.query_drop(format!("DROP {} {}", keyword, quote_identifier(&name)))?;
        }
        Ok(())
    }
}
