use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlmig::{ConnectionConfig, DatabaseKind};
use std::path::PathBuf;

/// Apply ordered SQL migration scripts and track which ones have run.
#[derive(Parser, Debug)]
#[command(name = "sqlmig", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and project settings shared by every command.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Type of database
    #[arg(short = 't', long = "type", env = "SQLMIG_TYPE", value_parser = parse_kind)]
    pub kind: DatabaseKind,

    /// Database host (network databases only; defaults to localhost)
    #[arg(short = 'H', long, env = "SQLMIG_HOST", global = true)]
    pub host: Option<String>,

    /// Database port (defaults to the vendor's standard port)
    #[arg(short = 'p', long, env = "SQLMIG_PORT", global = true)]
    pub port: Option<u16>,

    /// Database user
    #[arg(short = 'u', long, env = "SQLMIG_USER", global = true)]
    pub user: Option<String>,

    /// Database password
    #[arg(long, env = "SQLMIG_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Database name, or the database file for sqlite
    #[arg(short = 'd', long, env = "SQLMIG_DATABASE")]
    pub database: String,

    /// Schema search path (postgres only)
    #[arg(short = 's', long, env = "SQLMIG_SCHEMA", global = true)]
    pub schema: Option<String>,

    /// Directory containing migration scripts
    #[arg(
        short = 'm',
        long,
        env = "SQLMIG_MIGRATIONS_DIR",
        default_value = "migrations",
        global = true
    )]
    pub migrations_dir: PathBuf,

    /// Name of the table that records applied migrations
    #[arg(long, env = "SQLMIG_TABLE", default_value = sqlmig::DEFAULT_TABLE_NAME, global = true)]
    pub table: String,

    /// Log more (-v for info, -vv for debug). RUST_LOG takes precedence.
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalArgs {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            kind: self.kind,
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            schema: self.schema.clone(),
        }
    }
}

fn parse_kind(value: &str) -> Result<DatabaseKind, String> {
    value.parse().map_err(|e: sqlmig::Error| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the migration table, recording existing migrations as already applied
    Bootstrap {
        /// Leave every migration pending instead, e.g. to build the database from scratch
        #[arg(long)]
        no_load_existing: bool,
    },
    /// Drop the migration table
    Drop {
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// List applied and pending migrations
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Run pending migrations
    Migrate {
        /// Do not back up the database first
        #[arg(long)]
        no_backup: bool,

        /// Where to write the backup (defaults to the system temp directory)
        #[arg(long, env = "SQLMIG_BACKUP_DIR")]
        backup_dir: Option<PathBuf>,
    },
    /// Write a snapshot of the database structure and applied migrations
    Snapshot {
        /// File to write the snapshot to
        outfile: PathBuf,
    },
    /// Check that a current snapshot plus pending migrations equals a target snapshot.
    /// Every object in the database is dropped.
    Test {
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,

        /// Snapshot of the database as it is now
        current: PathBuf,

        /// Snapshot of the database as it should be after migrating
        target: PathBuf,
    },
}

/// Output format for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
