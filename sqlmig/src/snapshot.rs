//! Structural snapshots and the snapshot-based test workflow.

use crate::compare::{Comparator, Comparison};
use crate::core::MigrationFailure;
use crate::driver::{Driver, DumpTool};
use crate::error::Error;
use crate::runner::Migrator;
use crate::store::MetadataStore;
use std::path::Path;

/// Result of [Migrator::test].
#[derive(Debug, PartialEq)]
pub struct TestReport {
    /// Migrations executed on top of the current snapshot.
    pub migrations_run: Vec<String>,
    /// Set when a migration failed. No comparison is made in that case.
    pub failing_migration: Option<MigrationFailure>,
    pub comparison: Option<Comparison>,
}

impl TestReport {
    pub fn is_success(&self) -> bool {
        self.failing_migration.is_none()
            && self.comparison.as_ref().is_some_and(|c| c.identical)
    }

    /// `Ok` if every migration ran and the result matched the target.
    pub fn into_result(self) -> Result<Vec<String>, Error> {
        if let Some(MigrationFailure { name, error }) = self.failing_migration {
            return Err(Error::Migration {
                name,
                source: Box::new(error),
                restored: false,
            });
        }
        match self.comparison {
            Some(comparison) if !comparison.identical => Err(Error::ComparisonMismatch {
                diff: comparison.diff,
            }),
            _ => Ok(self.migrations_run),
        }
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl Migrator {
    /// A data-free dump of the database, followed by inserts that mark every recorded
    /// migration as succeeded. Loading it into an empty database reproduces both the
    /// structure and the set of applied migrations.
    pub fn snapshot(
        &self,
        driver: &mut dyn Driver,
        tool: &mut dyn DumpTool,
    ) -> Result<String, Error> {
        let records = MetadataStore::new(driver, self.table_name()).load_bootstrapped()?;

        let mut snapshot = tool.snapshot()?;
        if !snapshot.is_empty() && !snapshot.ends_with('\n') {
            snapshot.push('\n');
        }
        if let Some(preamble) = tool.session_preamble() {
            snapshot.push_str(&preamble);
            snapshot.push('\n');
        }
        for record in records {
            snapshot.push_str(&format!(
                "INSERT INTO {} (name, status) VALUES ({}, 'succeeded');\n",
                self.table_name(),
                quote(&record.name)
            ));
        }
        Ok(snapshot)
    }

    /// Check that `current` plus the pending migrations produces `target`.
    ///
    /// Empties the database, loads the `current` snapshot file, runs every migration not
    /// recorded in it, then compares a fresh snapshot against `target`. No backup is
    /// taken: the database is destroyed either way.
    pub fn test(
        &self,
        driver: &mut dyn Driver,
        tool: &mut dyn DumpTool,
        current: &Path,
        target: &str,
    ) -> Result<TestReport, Error> {
        #[cfg(feature = "tracing")]
        tracing::warn!(current = %current.display(), "Dropping all objects and loading snapshot");

        // an unreadable snapshot must fail before anything is dropped
        std::fs::File::open(current).map_err(|e| Error::io(current, e))?;

        tool.drop_and_recreate()?;
        tool.restore(current)?;

        let plan = self.plan(driver)?;
        let (migrations_run, failure) = self.execute(driver, &plan.pending);
        if failure.is_some() {
            return Ok(TestReport {
                migrations_run,
                failing_migration: failure,
                comparison: None,
            });
        }

        let migrated = self.snapshot(driver, tool)?;
        let comparison = Comparator::new(self.table_name()).compare(&migrated, target);

        #[cfg(feature = "tracing")]
        tracing::info!(identical = comparison.identical, "Compared migrated database to target");

        Ok(TestReport {
            migrations_run,
            failing_migration: None,
            comparison: Some(comparison),
        })
    }
}
