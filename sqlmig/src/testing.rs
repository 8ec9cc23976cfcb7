//! In-memory collaborators for exercising the engine without a database server.
//!
//! [MemoryDriver] and [MemoryDumpTool] share one [MemoryDatabase], so a restore performed
//! by the tool is visible through the driver, the same way a vendor dump tool and a live
//! connection share a real database.
//!
//! The driver understands just enough SQL for migration scripts used in tests:
//! `CREATE TABLE <name>` and `DROP TABLE <name>` statements change the set of tables,
//! anything else is accepted and only logged.
//!
//! # Example
//!
//! ```
//! use sqlmig::testing::{MemoryDatabase, MemoryDriver, MemoryDumpTool};
//! use sqlmig::{Driver, DumpTool};
//!
//! let db = MemoryDatabase::shared();
//! db.borrow_mut().fail_on = Some("BROKEN".to_string());
//! let mut driver = MemoryDriver::new(db.clone());
//! let mut tool = MemoryDumpTool::new(db.clone());
//!
//! driver.execute_script("CREATE TABLE users (id INT)").unwrap();
//! assert!(driver.execute_script("BROKEN").is_err());
//! assert_eq!(tool.snapshot().unwrap(), "CREATE TABLE users;\n");
//! ```

use crate::core::{MigrationRecord, MigrationStatus, Timestamp};
use crate::driver::{Driver, DumpTool};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;

/// The persistent part of a [MemoryDatabase]: what a backup captures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySchema {
    pub tables: BTreeSet<String>,
    /// Rows of tables used as metadata tables.
    pub records: BTreeMap<String, Vec<MigrationRecord>>,
}

/// State shared by a [MemoryDriver] and a [MemoryDumpTool].
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    pub schema: MemorySchema,
    /// Every script executed through the driver, in order.
    pub executed: Vec<String>,
    /// Scripts containing this text fail as if the server rejected them.
    pub fail_on: Option<String>,
    pub fail_backup: bool,
    pub fail_restore: bool,
    pub backups: usize,
    pub restores: usize,
}

impl MemoryDatabase {
    pub fn shared() -> Rc<RefCell<MemoryDatabase>> {
        Rc::new(RefCell::new(MemoryDatabase::default()))
    }

    fn apply(&mut self, sql: &str) -> Result<(), Error> {
        if let Some(ref marker) = self.fail_on {
            if sql.contains(marker.as_str()) {
                return Err(Error::Generic(format!("syntax error near \"{}\"", marker)));
            }
        }
        for statement in sql.split(';') {
            let words: Vec<&str> = statement.split_whitespace().collect();
            match words.as_slice() {
                [create, table, name, ..]
                    if create.eq_ignore_ascii_case("CREATE") && table.eq_ignore_ascii_case("TABLE") =>
                {
                    let name = table_name(name);
                    if !self.schema.tables.insert(name.clone()) {
                        return Err(Error::Generic(format!("table {} already exists", name)));
                    }
                }
                [drop, table, name, ..]
                    if drop.eq_ignore_ascii_case("DROP") && table.eq_ignore_ascii_case("TABLE") =>
                {
                    let name = table_name(name);
                    if !self.schema.tables.remove(&name) {
                        return Err(Error::Generic(format!("no such table: {}", name)));
                    }
                    self.schema.records.remove(&name);
                }
                _ => {}
            }
        }
        self.executed.push(sql.to_string());
        Ok(())
    }

    fn rows(&mut self, table: &str) -> Result<&mut Vec<MigrationRecord>, Error> {
        if !self.schema.tables.contains(table) {
            return Err(Error::Generic(format!("no such table: {}", table)));
        }
        Ok(self.schema.records.entry(table.to_string()).or_default())
    }
}

fn table_name(token: &str) -> String {
    token
        .split('(')
        .next()
        .unwrap_or(token)
        .trim()
        .to_string()
}

/// A [Driver] backed by a [MemoryDatabase].
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    db: Rc<RefCell<MemoryDatabase>>,
}

impl MemoryDriver {
    pub fn new(db: Rc<RefCell<MemoryDatabase>>) -> Self {
        Self { db }
    }
}

impl Driver for MemoryDriver {
    fn execute_script(&mut self, sql: &str) -> Result<(), Error> {
        self.db.borrow_mut().apply(sql)
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        Ok(self.db.borrow().schema.tables.contains(table))
    }

    fn select_records(&mut self, table: &str) -> Result<Vec<MigrationRecord>, Error> {
        Ok(self.db.borrow_mut().rows(table)?.clone())
    }

    fn insert_record(&mut self, table: &str, record: &MigrationRecord) -> Result<(), Error> {
        let mut db = self.db.borrow_mut();
        let rows = db.rows(table)?;
        if rows.iter().any(|r| r.name == record.name) {
            return Err(Error::Generic(format!(
                "UNIQUE constraint failed: {}.name",
                table
            )));
        }
        rows.push(record.clone());
        Ok(())
    }

    fn update_record(
        &mut self,
        table: &str,
        name: &str,
        status: MigrationStatus,
        completed_at: Option<Timestamp>,
    ) -> Result<(), Error> {
        let mut db = self.db.borrow_mut();
        for row in db.rows(table)?.iter_mut().filter(|r| r.name == name) {
            row.status = status;
            row.completed_at = completed_at;
        }
        Ok(())
    }
}

/// A [DumpTool] backed by a [MemoryDatabase]. Backups are JSON files.
#[derive(Debug, Clone)]
pub struct MemoryDumpTool {
    db: Rc<RefCell<MemoryDatabase>>,
}

impl MemoryDumpTool {
    pub fn new(db: Rc<RefCell<MemoryDatabase>>) -> Self {
        Self { db }
    }
}

impl DumpTool for MemoryDumpTool {
    fn backup(&mut self, dest: &Path) -> Result<(), Error> {
        let mut db = self.db.borrow_mut();
        if db.fail_backup {
            return Err(Error::Generic("backup tool exited with status 2".to_string()));
        }
        let json = serde_json::to_string_pretty(&db.schema)
            .map_err(|e| Error::Generic(e.to_string()))?;
        std::fs::write(dest, json).map_err(|e| Error::io(dest, e))?;
        db.backups += 1;
        Ok(())
    }

    fn restore(&mut self, src: &Path) -> Result<(), Error> {
        let mut db = self.db.borrow_mut();
        if db.fail_restore {
            return Err(Error::Generic("restore tool exited with status 1".to_string()));
        }
        let json = std::fs::read_to_string(src).map_err(|e| Error::io(src, e))?;
        db.schema = serde_json::from_str(&json).map_err(|e| Error::Generic(e.to_string()))?;
        db.restores += 1;
        Ok(())
    }

    fn snapshot(&mut self) -> Result<String, Error> {
        Ok(self
            .db
            .borrow()
            .schema
            .tables
            .iter()
            .map(|t| format!("CREATE TABLE {};\n", t))
            .collect())
    }

    fn drop_and_recreate(&mut self) -> Result<(), Error> {
        let mut db = self.db.borrow_mut();
        if db.fail_restore {
            return Err(Error::Generic("cannot drop database objects".to_string()));
        }
        db.schema = MemorySchema::default();
        Ok(())
    }
}
