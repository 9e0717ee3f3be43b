use std::fs;
use std::path::{Path, PathBuf};

use skinpack_core::{classification_key, BACKUP_DIR_NAME};

use crate::types::{InstallError, IoContext};

const LOCK_FILE_NAME: &str = ".skinpack.lock";

/// On-disk locations an install touches: the host's resource root and its
/// settings directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLayout {
    resource_root: PathBuf,
    settings_dir: PathBuf,
}

impl ResourceLayout {
    pub fn new(resource_root: impl Into<PathBuf>, settings_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_root: resource_root.into(),
            settings_dir: settings_dir.into(),
        }
    }

    pub fn resource_root(&self) -> &Path {
        &self.resource_root
    }

    pub fn settings_dir(&self) -> &Path {
        &self.settings_dir
    }

    pub fn resource_dir(&self, name: &str) -> PathBuf {
        self.resource_root.join(name)
    }

    /// Destination of a `/`-separated path relative to the resource root.
    pub fn resource_path(&self, relative: &str) -> PathBuf {
        join_relative(&self.resource_root, relative)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.resource_root.join(BACKUP_DIR_NAME)
    }

    pub fn snapshot_dir(&self, name: &str) -> PathBuf {
        self.backup_dir().join(name)
    }

    /// Backed-up copy of a resource-relative path.
    pub fn snapshot_path(&self, relative: &str) -> PathBuf {
        join_relative(&self.backup_dir(), relative)
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.settings_dir.join("Plugins")
    }

    pub fn plugin_path(&self, file_name: &str) -> PathBuf {
        self.plugins_dir().join(file_name)
    }

    pub fn layouts_dir(&self) -> PathBuf {
        self.settings_dir.join("Layouts")
    }

    pub fn layout_path(&self, relative: &str) -> PathBuf {
        join_relative(&self.layouts_dir(), relative)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.backup_dir().join(LOCK_FILE_NAME)
    }

    pub fn ensure_base_dirs(&self) -> Result<(), InstallError> {
        for dir in [self.resource_root.clone(), self.backup_dir()] {
            fs::create_dir_all(&dir).io_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in classification_key(relative)
        .split('/')
        .filter(|segment| !segment.is_empty())
    {
        path.push(segment);
    }
    path
}
