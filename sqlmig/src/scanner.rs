//! Discovery of migration scripts on disk.

use crate::core::Migration;
use crate::error::Error;
use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// The extension of migration scripts unless configured otherwise.
pub const DEFAULT_EXTENSION: &str = "sql";

/// The canonical execution order of migration names.
///
/// Names compare case-insensitively; names that differ only by case fall back to a
/// byte-wise comparison so the order stays total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_uppercase()
        .cmp(&b.to_uppercase())
        .then_with(|| a.cmp(b))
}

/// A directory tree of migration scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSource {
    root: PathBuf,
    extension: String,
}

impl MigrationSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Only files with this extension (without the dot) are migrations.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fail with [Error::Configuration] unless the root is an existing directory.
    pub fn check(&self) -> Result<(), Error> {
        if !self.root.is_dir() {
            return Err(Error::Configuration(format!(
                "migrations directory {} does not exist or is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    /// Recursively read every migration under the root, in execution order.
    ///
    /// An empty directory yields no migrations. A missing or unreadable root is an error.
    pub fn scan(&self) -> Result<Vec<Migration>, Error> {
        self.check()?;

        let mut migrations = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                Error::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(self.extension.as_str()) {
                continue;
            }

            let name = self.name_for(path)?;
            let sql = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            migrations.push(Migration {
                name,
                path: path.to_path_buf(),
                sql,
            });
        }

        migrations.sort_by(|a, b| compare_names(&a.name, &b.name));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            root = %self.root.display(),
            count = migrations.len(),
            "Scanned migrations"
        );

        Ok(migrations)
    }

    /// Names of every migration under the root, in execution order.
    pub fn names(&self) -> Result<Vec<String>, Error> {
        Ok(self.scan()?.into_iter().map(|m| m.name).collect())
    }

    /// Path relative to the root, extension stripped, components joined with `/`.
    fn name_for(&self, path: &Path) -> Result<String, Error> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| {
                Error::Configuration(format!(
                    "{} is outside migrations directory {}",
                    path.display(),
                    self.root.display()
                ))
            })?
            .with_extension("");

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                    Error::Configuration(format!(
                        "migration path {} is not valid UTF-8",
                        path.display()
                    ))
                })?),
                Component::CurDir => {}
                _ => {
                    return Err(Error::Configuration(format!(
                        "unexpected component in migration path {}",
                        path.display()
                    )))
                }
            }
        }
        Ok(parts.join("/"))
    }
}
