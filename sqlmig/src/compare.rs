//! Structural comparison of two snapshots.

use similar::TextDiff;

/// Outcome of comparing two structural snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub identical: bool,
    /// A unified diff from the migrated snapshot to the target. Empty when identical.
    pub diff: String,
}

/// Compares snapshots line by line, skipping the metadata inserts that
/// [snapshot](crate::Migrator::snapshot) appends.
#[derive(Debug, Clone)]
pub struct Comparator {
    ignore_prefix: String,
}

impl Comparator {
    /// Lines starting with `INSERT INTO <table>` are left out of the comparison.
    pub fn new(table: &str) -> Self {
        Self {
            ignore_prefix: format!("INSERT INTO {}", table),
        }
    }

    pub fn compare(&self, migrated: &str, target: &str) -> Comparison {
        let migrated = self.significant_lines(migrated);
        let target = self.significant_lines(target);
        if migrated == target {
            return Comparison {
                identical: true,
                diff: String::new(),
            };
        }

        let diff = TextDiff::from_lines(&migrated, &target)
            .unified_diff()
            .context_radius(3)
            .header("Migrated DB", "Target DB")
            .to_string();
        Comparison {
            identical: false,
            diff,
        }
    }

    fn significant_lines(&self, snapshot: &str) -> String {
        snapshot
            .split_inclusive('\n')
            .filter(|line| !line.starts_with(&self.ignore_prefix))
            .collect()
    }
}
