//! The metadata table that records which migrations have run.

use crate::core::{MigrationRecord, MigrationStatus, Timestamp};
use crate::driver::Driver;
use crate::error::Error;
use std::cmp::Ordering;

/// `NULL DEFAULT NULL` is spelled out because MySQL otherwise coerces a null timestamp to now().
pub(crate) fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE {} (
            name VARCHAR(255) PRIMARY KEY,
            status VARCHAR(255) NULL DEFAULT NULL,
            started_at TIMESTAMP NULL DEFAULT NULL,
            completed_at TIMESTAMP NULL DEFAULT NULL
        )",
        table
    )
}

/// Check that a table name can be interpolated into SQL as a bare identifier.
pub(crate) fn validate_table_name(table: &str) -> Result<(), Error> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "invalid migration table name '{}': use letters, digits and underscores",
            table
        )))
    }
}

/// Records ordered the way they were applied: rows never started (bootstrapped) first,
/// then by start time, then by name.
fn applied_order(a: &MigrationRecord, b: &MigrationRecord) -> Ordering {
    a.started_at
        .cmp(&b.started_at)
        .then_with(|| a.name.cmp(&b.name))
}

/// Access to the metadata table through a [Driver].
pub struct MetadataStore<'d> {
    driver: &'d mut dyn Driver,
    table: &'d str,
}

impl<'d> MetadataStore<'d> {
    pub fn new(driver: &'d mut dyn Driver, table: &'d str) -> Self {
        Self { driver, table }
    }

    pub fn table(&self) -> &str {
        self.table
    }

    pub fn exists(&mut self) -> Result<bool, Error> {
        self.driver.table_exists(self.table)
    }

    /// Create the table if it is absent. Returns whether it already existed.
    pub fn ensure_bootstrapped(&mut self) -> Result<bool, Error> {
        let existed = self.exists()?;
        if !existed {
            #[cfg(feature = "tracing")]
            tracing::info!("Creating migration tracking table: {}", self.table);

            self.driver.execute_script(&create_table_sql(self.table))?;
        }
        Ok(existed)
    }

    /// Every persisted record, in applied order.
    pub fn load_all(&mut self) -> Result<Vec<MigrationRecord>, Error> {
        let mut records = self.driver.select_records(self.table)?;
        records.sort_by(applied_order);
        Ok(records)
    }

    /// Like [MetadataStore::load_all], but a missing table is reported as
    /// [Error::NotBootstrapped] rather than a driver error.
    pub fn load_bootstrapped(&mut self) -> Result<Vec<MigrationRecord>, Error> {
        if !self.exists()? {
            return Err(Error::NotBootstrapped(self.table.to_string()));
        }
        self.load_all()
    }

    /// Names whose last run did not complete.
    pub fn failed_names(&mut self) -> Result<Vec<String>, Error> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.status == MigrationStatus::Failed)
            .map(|r| r.name)
            .collect())
    }

    /// Record migrations as already reflected in the database, without timestamps.
    pub fn insert_as_bootstrapped(&mut self, names: &[String]) -> Result<(), Error> {
        for name in names {
            #[cfg(feature = "tracing")]
            tracing::debug!(name = %name, "Recording bootstrapped migration");

            self.driver.insert_record(
                self.table,
                &MigrationRecord {
                    name: name.clone(),
                    status: MigrationStatus::Bootstrapped,
                    started_at: None,
                    completed_at: None,
                },
            )?;
        }
        Ok(())
    }

    /// Claim a migration before running it.
    ///
    /// The row is written as `failed` up front so that a crash or dropped connection
    /// during the migration leaves a durable marker. [MetadataStore::mark_succeeded]
    /// upgrades it afterwards.
    pub fn mark_started(&mut self, name: &str, timestamp: Timestamp) -> Result<(), Error> {
        self.driver.insert_record(
            self.table,
            &MigrationRecord {
                name: name.to_string(),
                status: MigrationStatus::Failed,
                started_at: Some(timestamp),
                completed_at: None,
            },
        )
    }

    pub fn mark_succeeded(&mut self, name: &str, timestamp: Timestamp) -> Result<(), Error> {
        self.driver.update_record(
            self.table,
            name,
            MigrationStatus::Succeeded,
            Some(timestamp),
        )
    }

    /// Delete the table and every record in it.
    pub fn drop(&mut self) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::warn!("Dropping migration tracking table: {}", self.table);

        self.driver
            .execute_script(&format!("DROP TABLE {}", self.table))
    }
}
