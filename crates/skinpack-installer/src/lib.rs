mod backup;
mod fs_utils;
mod install;
mod layout;
mod lock;
mod package;
mod plan;
mod plugin_gate;
mod types;
mod variables;

pub use backup::{BackupManager, BackupMode, BackupRecord, RestoreReport};
pub use install::{
    InstallOptions, InstallOutcome, Installer, PluginReport, RelaunchStatus,
};
pub use layout::ResourceLayout;
pub use lock::InstallLock;
pub use package::{
    open_package, read_metadata, ArchiveError, PackageArchive, PackageEntry, ZipPackage,
    PACKAGE_EXTENSION,
};
pub use plan::{InstallPlan, PlannedEntry};
pub use plugin_gate::{install_plugin, PluginAction};
pub use types::{error_chain, FailureKind, InstallError};
pub use variables::{restore_variables, VARIABLES_SECTION};
