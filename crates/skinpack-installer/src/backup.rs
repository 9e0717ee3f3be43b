use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::fs_utils::{copy_dir_recursive, remove_path_if_exists};
use crate::types::{InstallError, IoContext};
use crate::ResourceLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    /// Move the resource aside; the install then starts from an empty
    /// directory.
    Move,
    /// Copy the resource, leaving the original in place for a merge install.
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupRecord {
    /// Nothing existed at the resource location.
    Absent,
    Snapshot(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Resources put back from their snapshot.
    pub restored: Vec<String>,
    /// Resources that did not exist before and were removed again.
    pub removed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Snapshots resource directories under `@Backup` and puts them back when an
/// install has to be undone.
pub struct BackupManager<'a> {
    layout: &'a ResourceLayout,
    records: Vec<(String, BackupRecord)>,
}

impl<'a> BackupManager<'a> {
    pub fn new(layout: &'a ResourceLayout) -> Self {
        Self {
            layout,
            records: Vec::new(),
        }
    }

    pub fn backup(&mut self, name: &str, mode: BackupMode) -> Result<BackupRecord, InstallError> {
        let record = self
            .snapshot(name, mode)
            .map_err(|source| InstallError::Backup {
                name: name.to_string(),
                source: Box::new(source),
            })?;
        tracing::debug!(resource = name, ?mode, ?record, "backed up resource");
        Ok(record)
    }

    /// Names backed up in this run, in order.
    pub fn backed_up(&self) -> Vec<String> {
        self.records.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn record(&self, name: &str) -> Option<&BackupRecord> {
        self.records
            .iter()
            .find(|(found, _)| found.eq_ignore_ascii_case(name))
            .map(|(_, record)| record)
    }

    /// Puts every listed resource back the way it was before the install.
    /// Failures are collected rather than returned so that every name gets
    /// its attempt.
    pub fn restore(&self, names: &[String]) -> RestoreReport {
        let mut report = RestoreReport::default();
        for name in names {
            let target = self.layout.resource_dir(name);
            let result = match self.record(name) {
                Some(BackupRecord::Absent) => remove_path_if_exists(&target)
                    .io_context(|| format!("failed to remove {}", target.display()))
                    .map(|()| report.removed.push(name.clone())),
                _ => self
                    .restore_snapshot(name)
                    .map(|()| report.restored.push(name.clone())),
            };
            if let Err(err) = result {
                let reason = err.chain();
                tracing::warn!(resource = %name, error = %reason, "failed to restore resource");
                report.failed.push((name.clone(), reason));
            }
        }
        report
    }

    fn snapshot(&mut self, name: &str, mode: BackupMode) -> Result<BackupRecord, InstallError> {
        let source = self.layout.resource_dir(name);
        let snapshot = self.layout.snapshot_dir(name);

        if fs::symlink_metadata(&source).is_err() {
            self.remember(name, BackupRecord::Absent);
            return Ok(BackupRecord::Absent);
        }

        remove_path_if_exists(&snapshot)
            .io_context(|| format!("failed to remove stale snapshot {}", snapshot.display()))?;
        let backup_dir = self.layout.backup_dir();
        fs::create_dir_all(&backup_dir)
            .io_context(|| format!("failed to create {}", backup_dir.display()))?;

        match mode {
            BackupMode::Move => {
                if let Err(err) = fs::rename(&source, &snapshot) {
                    tracing::debug!(error = %err, "rename failed; copying snapshot instead");
                    self.copy_snapshot(&source, &snapshot)?;
                    // complete from here on, even if the cleanup below fails
                    self.remember(name, BackupRecord::Snapshot(snapshot.clone()));
                    remove_path_if_exists(&source)
                        .io_context(|| format!("failed to remove {}", source.display()))?;
                    return Ok(BackupRecord::Snapshot(snapshot));
                }
            }
            BackupMode::Copy => self.copy_snapshot(&source, &snapshot)?,
        }

        let record = BackupRecord::Snapshot(snapshot);
        self.remember(name, record.clone());
        Ok(record)
    }

    fn copy_snapshot(&self, source: &Path, snapshot: &Path) -> Result<(), InstallError> {
        if let Err(err) = copy_dir_recursive(source, snapshot) {
            if let Err(cleanup) = remove_path_if_exists(snapshot) {
                tracing::warn!(
                    path = %snapshot.display(),
                    error = %cleanup,
                    "failed to remove partial snapshot"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    fn restore_snapshot(&self, name: &str) -> Result<(), InstallError> {
        let snapshot = self.layout.snapshot_dir(name);
        let target = self.layout.resource_dir(name);
        if !snapshot.is_dir() {
            return Err(InstallError::Io {
                context: format!("snapshot {} is missing", snapshot.display()),
                source: io::Error::new(io::ErrorKind::NotFound, "no snapshot"),
            });
        }
        remove_path_if_exists(&target)
            .io_context(|| format!("failed to clear {}", target.display()))?;
        copy_dir_recursive(&snapshot, &target)
    }

    fn remember(&mut self, name: &str, record: BackupRecord) {
        match self
            .records
            .iter_mut()
            .find(|(found, _)| found.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = record,
            None => self.records.push((name.to_string(), record)),
        }
    }
}
