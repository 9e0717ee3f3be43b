use std::fs;
use std::path::Path;

use skinpack_core::is_newer;

use crate::fs_utils::ensure_parent_dir;
use crate::package::extract_to;
use crate::types::{InstallError, IoContext};
use crate::{PackageArchive, PackageEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginAction {
    /// No plugin of that name was installed.
    Installed,
    /// The packaged binary is newer and replaced the installed one.
    Upgraded,
    /// The installed binary is at least as new.
    Kept,
    /// One of the versions could not be read; the installed binary is kept.
    Unverified { reason: String },
}

impl PluginAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Upgraded => "upgraded",
            Self::Kept => "kept",
            Self::Unverified { .. } => "unverified",
        }
    }
}

/// Places a plugin binary at `destination` unless an installed binary of the
/// same name is at least as new. The packaged binary is staged in
/// `staging_dir` for the comparison.
pub fn install_plugin<A: PackageArchive + ?Sized>(
    archive: &mut A,
    entry: &PackageEntry,
    destination: &Path,
    staging_dir: &Path,
) -> Result<PluginAction, InstallError> {
    if !destination.exists() {
        extract_to(archive, entry, destination)?;
        return Ok(PluginAction::Installed);
    }

    let file_name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "plugin".into());
    let staged = staging_dir.join(file_name);
    extract_to(archive, entry, &staged)?;

    let action = match is_newer(&staged, destination) {
        Ok(true) => {
            ensure_parent_dir(destination)?;
            fs::copy(&staged, destination).io_context(|| {
                format!(
                    "failed to copy {} to {}",
                    staged.display(),
                    destination.display()
                )
            })?;
            PluginAction::Upgraded
        }
        Ok(false) => PluginAction::Kept,
        Err(err) => {
            tracing::warn!(
                plugin = %destination.display(),
                error = %err,
                "cannot compare plugin versions; keeping installed binary"
            );
            PluginAction::Unverified {
                reason: err.to_string(),
            }
        }
    };

    if let Err(err) = fs::remove_file(&staged) {
        tracing::debug!(path = %staged.display(), error = %err, "failed to remove staged plugin");
    }
    Ok(action)
}

