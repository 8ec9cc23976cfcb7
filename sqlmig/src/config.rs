//! Connection settings, built once at startup and handed to the vendor adapters.

use crate::driver::{Driver, DumpTool};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The database vendors sqlmig can manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Sqlite,
    Mysql,
    Postgres,
}

impl DatabaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Postgres => "postgres",
        }
    }

    /// Whether this build includes the adapter for this kind.
    pub fn is_supported(&self) -> bool {
        match self {
            DatabaseKind::Sqlite => cfg!(feature = "sqlite"),
            DatabaseKind::Mysql => cfg!(feature = "mysql"),
            DatabaseKind::Postgres => cfg!(feature = "postgres"),
        }
    }

    fn default_port(&self) -> Option<u16> {
        match self {
            DatabaseKind::Sqlite => None,
            DatabaseKind::Mysql => Some(3306),
            DatabaseKind::Postgres => Some(5432),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DatabaseKind::Sqlite),
            "mysql" => Ok(DatabaseKind::Mysql),
            "postgres" | "postgresql" => Ok(DatabaseKind::Postgres),
            other => Err(Error::Configuration(format!(
                "unknown database type '{}'; expected sqlite, mysql or postgres",
                other
            ))),
        }
    }
}

/// Where and how to connect to the managed database.
///
/// For SQLite `database` is the path of the database file and every network field must
/// be unset.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub kind: DatabaseKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub database: String,
    /// PostgreSQL only: comma-separated schemas, the first one receiving new objects.
    pub schema: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            kind: DatabaseKind::Sqlite,
            host: None,
            port: None,
            user: None,
            password: None,
            database: path.into(),
            schema: None,
        }
    }

    /// Check the combination of settings for this kind.
    pub fn validate(&self) -> Result<(), Error> {
        if self.database.is_empty() {
            return Err(Error::Configuration("a database name is required".to_string()));
        }
        match self.kind {
            DatabaseKind::Sqlite => {
                let network = [
                    ("host", self.host.is_some()),
                    ("port", self.port.is_some()),
                    ("user", self.user.is_some()),
                    ("password", self.password.is_some()),
                    ("schema", self.schema.is_some()),
                ];
                if let Some((field, _)) = network.iter().find(|(_, set)| *set) {
                    return Err(Error::Configuration(format!(
                        "sqlite does not use a {}",
                        field
                    )));
                }
            }
            DatabaseKind::Mysql | DatabaseKind::Postgres => {
                if self.user.as_deref().map_or(true, str::is_empty) {
                    return Err(Error::Configuration(format!(
                        "{} requires a user",
                        self.kind
                    )));
                }
                if self.kind == DatabaseKind::Mysql && self.schema.is_some() {
                    return Err(Error::Configuration(
                        "mysql does not support schemas; use the database name".to_string(),
                    ));
                }
            }
        }
        if !self.kind.is_supported() {
            return Err(Error::Configuration(format!(
                "support for {} is not compiled in; enable the `{}` feature",
                self.kind, self.kind
            )));
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    pub fn port(&self) -> Option<u16> {
        self.port.or_else(|| self.kind.default_port())
    }

    /// Schemas named by `schema`, in search order. `"$user"` resolves to the user name,
    /// as it does in a PostgreSQL search path.
    pub fn schemas(&self) -> Vec<String> {
        let Some(ref schema) = self.schema else {
            return vec![];
        };
        schema
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match (s, self.user.as_deref()) {
                ("$user" | "\"$user\"", Some(user)) => user.to_string(),
                _ => s.to_string(),
            })
            .collect()
    }

    /// A human-readable description of the target, for confirmation prompts.
    pub fn location(&self) -> String {
        match self.kind {
            DatabaseKind::Sqlite => format!("sqlite database \"{}\"", self.database),
            _ => {
                let mut location = format!(
                    "{} database \"{}\" on {}",
                    self.kind,
                    self.database,
                    self.host()
                );
                if let Some(port) = self.port {
                    location.push_str(&format!(":{}", port));
                }
                if let Some(ref schema) = self.schema {
                    location.push_str(&format!(" (schema {})", schema));
                }
                location
            }
        }
    }
}

/// Open a [Driver] for the configured database.
pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn Driver>, Error> {
    config.validate()?;

    #[cfg(feature = "tracing")]
    tracing::debug!(location = %config.location(), "Connecting");

    match config.kind {
        #[cfg(feature = "sqlite")]
        DatabaseKind::Sqlite => Ok(Box::new(crate::sqlite::SqliteDriver::open(
            &config.database,
        )?)),
        #[cfg(feature = "mysql")]
        DatabaseKind::Mysql => Ok(Box::new(crate::mysql::MysqlDriver::connect(config)?)),
        #[cfg(feature = "postgres")]
        DatabaseKind::Postgres => Ok(Box::new(crate::postgres::PostgresDriver::connect(
            config,
        )?)),
        #[allow(unreachable_patterns)]
        kind => Err(Error::Configuration(format!(
            "support for {} is not compiled in",
            kind
        ))),
    }
}

/// Build the [DumpTool] for the configured database.
pub fn dump_tool(config: &ConnectionConfig) -> Result<Box<dyn DumpTool>, Error> {
    config.validate()?;
    match config.kind {
        #[cfg(feature = "sqlite")]
        DatabaseKind::Sqlite => Ok(Box::new(crate::sqlite::SqliteDumpTool::new(
            &config.database,
        ))),
        #[cfg(feature = "mysql")]
        DatabaseKind::Mysql => Ok(Box::new(crate::mysql::MysqlDumpTool::new(config.clone()))),
        #[cfg(feature = "postgres")]
        DatabaseKind::Postgres => Ok(Box::new(crate::postgres::PostgresDumpTool::new(
            config.clone(),
        ))),
        #[allow(unreachable_patterns)]
        kind => Err(Error::Configuration(format!(
            "support for {} is not compiled in",
            kind
        ))),
    }
}
