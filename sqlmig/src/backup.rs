//! The safety net taken around a migration batch.

use crate::driver::DumpTool;
use crate::error::Error;
use std::path::{Path, PathBuf};

/// A full dump of the database written before a batch runs.
///
/// Owned by the run that created it. It is only removed through
/// [BackupCoordinator::discard]; dropping the value leaves the file on disk.
#[derive(Debug, PartialEq, Eq)]
pub struct BackupArtifact {
    path: PathBuf,
}

impl BackupArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Creates, restores and discards [BackupArtifact]s through a [DumpTool].
pub struct BackupCoordinator<'t> {
    tool: &'t mut dyn DumpTool,
    dir: PathBuf,
}

impl<'t> BackupCoordinator<'t> {
    /// Backups are written to `dir`.
    pub fn new(tool: &'t mut dyn DumpTool, dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            dir: dir.into(),
        }
    }

    /// Dump the database to a new file. Any failure is reported as [Error::Backup] and
    /// leaves no file behind.
    pub fn create(&mut self) -> Result<BackupArtifact, Error> {
        let file = tempfile::Builder::new()
            .prefix("sqlmig-backup-")
            .suffix(".sql")
            .tempfile_in(&self.dir)
            .map_err(|e| Error::Backup(Box::new(Error::io(&self.dir, e))))?;
        // Persist the file now; from here on it is removed explicitly.
        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| Error::Backup(Box::new(Error::io(&self.dir, e.error))))?;

        #[cfg(feature = "tracing")]
        tracing::info!(path = %path.display(), "Backing up database");

        if let Err(error) = self.tool.backup(&path) {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %error, "Backup failed");

            if let Err(_cleanup) = std::fs::remove_file(&path) {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    error = %_cleanup,
                    path = %path.display(),
                    "Could not remove partial backup"
                );
            }
            return Err(Error::Backup(Box::new(error)));
        }

        Ok(BackupArtifact { path })
    }

    /// Empty the database and replay the artifact into it.
    pub fn restore(&mut self, artifact: &BackupArtifact) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::warn!(path = %artifact.path.display(), "Restoring database from backup");

        self.tool.drop_and_recreate()?;
        self.tool.restore(&artifact.path)
    }

    /// Delete the artifact from disk.
    pub fn discard(&self, artifact: BackupArtifact) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::info!(path = %artifact.path.display(), "Removing backup");

        std::fs::remove_file(&artifact.path).map_err(|e| Error::io(&artifact.path, e))
    }
}
