//! PostgreSQL support.
//!
//! [PostgresDriver] uses the synchronous `postgres` client. When a schema is configured it
//! becomes the connection's search path, so the metadata table and every migration land
//! in it. [PostgresDumpTool] runs `pg_dump` and `psql`, which must be on `PATH`, with the
//! password in `PGPASSWORD`.

use crate::config::{ConnectionConfig, DatabaseKind};
use crate::core::{MigrationRecord, MigrationStatus, Timestamp};
use crate::driver::process::{self, Output};
use crate::driver::{Driver, DumpTool};
use crate::error::Error;
use postgres::{Client, NoTls};
use std::path::Path;
use std::process::Command;

/// A [Driver] over a `postgres` client.
pub struct PostgresDriver {
    client: Client,
}

impl std::fmt::Debug for PostgresDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDriver")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

impl PostgresDriver {
    pub fn connect(config: &ConnectionConfig) -> Result<Self, Error> {
        if config.kind != DatabaseKind::Postgres {
            return Err(Error::Configuration(format!(
                "expected a postgres configuration, got {}",
                config.kind
            )));
        }
        let mut pg = postgres::Config::new();
        pg.host(config.host()).dbname(&config.database);
        if let Some(port) = config.port() {
            pg.port(port);
        }
        if let Some(ref user) = config.user {
            pg.user(user);
        }
        if let Some(ref password) = config.password {
            pg.password(password);
        }
        let mut client = pg.connect(NoTls).map_err(|e| {
            Error::Connection(format!("cannot connect to {}: {}", config.location(), e))
        })?;
        if let Some(ref schema) = config.schema {
            client.batch_execute(&format!("SET search_path TO {}", schema))?;
        }
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl Driver for PostgresDriver {
    fn execute_script(&mut self, sql: &str) -> Result<(), Error> {
        self.client.batch_execute(sql)?;
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        let row = self.client.query_one(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                 WHERE table_schema = current_schema() AND table_name = $1
            )",
            &[&table],
        )?;
        Ok(row.get(0))
    }

    fn select_records(&mut self, table: &str) -> Result<Vec<MigrationRecord>, Error> {
        let rows = self.client.query(
            &format!(
                "SELECT name, status, started_at, completed_at FROM {}",
                table
            ),
            &[],
        )?;
        rows.iter()
            .map(|row| {
                Ok(MigrationRecord {
                    name: row.get(0),
                    status: row.get::<_, String>(1).parse()?,
                    started_at: row.get(2),
                    completed_at: row.get(3),
                })
            })
            .collect()
    }

    fn insert_record(&mut self, table: &str, record: &MigrationRecord) -> Result<(), Error> {
        self.client.execute(
            &format!(
                "INSERT INTO {} (name, status, started_at, completed_at) VALUES ($1, $2, $3, $4)",
                table
            ),
            &[
                &record.name,
                &record.status.as_str(),
                &record.started_at,
                &record.completed_at,
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
        self.client.execute(
            &format!(
                "UPDATE {} SET status = $1, completed_at = $2 WHERE name = $3",
                table
            ),
            &[&status.as_str(), &completed_at, &name],
        )?;
        Ok(())
    }
}

/// A [DumpTool] driving `pg_dump` and `psql`.
#[derive(Debug, Clone)]
pub struct PostgresDumpTool {
    config: ConnectionConfig,
}

impl PostgresDumpTool {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    fn command(&self, program: &str) -> Command {
        let mut command = Command::new(program);
        command.arg("-h").arg(self.config.host());
        if let Some(ref user) = self.config.user {
            command.arg("-U").arg(user);
        }
        if let Some(port) = self.config.port {
            command.arg("-p").arg(port.to_string());
        }
        if let Some(ref password) = self.config.password {
            command.env("PGPASSWORD", password);
        }
        command
    }

    fn pg_dump(&self, extra: &[&str]) -> Command {
        let mut command = self.command("pg_dump");
        command.args(extra);
        for schema in self.config.schemas() {
            command.arg("-n").arg(schema);
        }
        command.arg(&self.config.database);
        command
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn drop_all(client: &mut Client, keyword: &str, query: &str) -> Result<(), Error> {
    let names: Vec<String> = client
        .query(query, &[])?
        .iter()
        .map(|row| row.get(0))
        .collect();
    if !names.is_empty() {
        #[cfg(feature = "tracing")]
        tracing::debug!(count = names.len(), "Dropping every {}", keyword);

        client.batch_execute(&format!("DROP {} {} CASCADE", keyword, names.join(", ")))?;
    }
    Ok(())
}

impl DumpTool for PostgresDumpTool {
    fn backup(&mut self, dest: &Path) -> Result<(), Error> {
        process::run(self.pg_dump(&[]), None, Output::File(dest))?;
        Ok(())
    }

    fn restore(&mut self, src: &Path) -> Result<(), Error> {
        let mut command = self.command("psql");
        command
            .args(["-v", "ON_ERROR_STOP=1"])
            .arg(&self.config.database);
        process::run(command, Some(src), Output::Discard)?;
        Ok(())
    }

    fn snapshot(&mut self) -> Result<String, Error> {
        // schema only, without grants, ownership or tablespaces
        let command = self.pg_dump(&["-s", "-x", "-O", "--no-tablespaces"]);
        let stdout = process::run(command, None, Output::Capture)?;
        String::from_utf8(stdout)
            .map_err(|e| Error::Generic(format!("pg_dump produced invalid UTF-8: {}", e)))
    }

    fn drop_and_recreate(&mut self) -> Result<(), Error> {
        let mut driver = PostgresDriver::connect(&self.config)?;
        let client = driver.client();

        drop_all(
            client,
            "VIEW",
            "SELECT quote_ident(schemaname) || '.' || quote_ident(viewname) FROM pg_views
              WHERE viewowner = current_user
                AND schemaname NOT IN ('pg_catalog', 'information_schema')",
        )?;
        drop_all(
            client,
            "TABLE",
            "SELECT quote_ident(schemaname) || '.' || quote_ident(tablename) FROM pg_tables
              WHERE tableowner = current_user
                AND schemaname NOT IN ('pg_catalog', 'information_schema')",
        )?;
        drop_all(
            client,
            "SEQUENCE",
            "SELECT quote_ident(n.nspname) || '.' || quote_ident(c.relname)
               FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace
              WHERE c.relkind = 'S'
                AND n.nspname NOT IN ('pg_catalog', 'information_schema')",
        )?;
        drop_all(
            client,
            "TYPE",
            "SELECT quote_ident(n.nspname) || '.' || quote_ident(t.typname)
               FROM pg_type t JOIN pg_namespace n ON n.oid = t.typnamespace
              WHERE t.typtype = 'e'
                AND n.nspname NOT IN ('pg_catalog', 'information_schema')",
        )?;
        for schema in self.config.schemas() {
            if schema != "public" {
                client.batch_execute(&format!(
                    "DROP SCHEMA IF EXISTS {} CASCADE",
                    quote_identifier(&schema)
                ))?;
            }
        }
        Ok(())
    }

    /// `pg_dump` empties the search path, so the metadata inserts that follow a snapshot
    /// need it set again.
    fn session_preamble(&self) -> Option<String> {
        Some(match self.config.schema {
            Some(ref schema) => format!("SET search_path = {};", schema),
            None => "SET search_path = \"$user\",public;".to_string(),
        })
    }
}
