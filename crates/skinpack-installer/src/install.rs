use std::path::Path;

use skinpack_core::{
    same_relative_path, Classifier, EntryCategory, PackageMetadata, Reporter,
    DEFAULT_PLUGIN_PLATFORM,
};
use skinpack_host::{HostControl, HostController, QuiesceOutcome};

use crate::backup::{BackupManager, BackupMode, BackupRecord, RestoreReport};
use crate::lock::InstallLock;
use crate::package::{extract_to, open_package, read_metadata, PackageArchive};
use crate::plan::{InstallPlan, PlannedEntry};
use crate::plugin_gate::{install_plugin, PluginAction};
use crate::types::{error_chain, FailureKind, InstallError, IoContext};
use crate::variables::restore_variables;
use crate::ResourceLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Carry variables over in merge mode too.
    pub keep_variables: bool,
    /// Never carry variables over.
    pub no_variables: bool,
    pub relaunch: bool,
    /// Snapshot resources by copy before a merge install.
    pub snapshot_merge: bool,
    pub plugin_platform: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            keep_variables: false,
            no_variables: false,
            relaunch: true,
            snapshot_merge: false,
            plugin_platform: DEFAULT_PLUGIN_PLATFORM.to_string(),
        }
    }
}

impl InstallOptions {
    pub fn preserves_variables(&self, merge_mode: bool) -> bool {
        (!merge_mode || self.keep_variables) && !self.no_variables
    }

    /// How resources are snapshotted before they are touched, if at all.
    pub fn backup_mode(&self, merge_mode: bool) -> Option<BackupMode> {
        if !merge_mode {
            Some(BackupMode::Move)
        } else if self.snapshot_merge || self.preserves_variables(merge_mode) {
            Some(BackupMode::Copy)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginReport {
    pub file: String,
    pub action: PluginAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelaunchStatus {
    Skipped,
    Started { elevated_fallback: bool },
    Failed { reason: String },
}

#[derive(Debug)]
pub enum InstallOutcome {
    Success {
        installed: Vec<String>,
        plugins: Vec<PluginReport>,
        layouts: Vec<String>,
        restored_variables: Vec<String>,
        relaunch: RelaunchStatus,
    },
    /// Stopped before anything under the resource root changed.
    Aborted { reason: InstallError },
    /// Stopped mid-install; backed-up resources were put back.
    RolledBack {
        reason: InstallError,
        restored: RestoreReport,
    },
}

impl InstallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Aborted { .. } => "aborted",
            Self::RolledBack { .. } => "rolled_back",
        }
    }

    pub fn reason(&self) -> Option<&InstallError> {
        match self {
            Self::Success { .. } => None,
            Self::Aborted { reason } | Self::RolledBack { reason, .. } => Some(reason),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.reason().map(InstallError::kind)
    }
}

#[derive(Debug, Default)]
struct Applied {
    installed: Vec<String>,
    plugins: Vec<PluginReport>,
    layouts: Vec<String>,
    restored_variables: Vec<String>,
}

/// Drives one install: validate, lock, quiesce the host, back up, apply,
/// and relaunch. Any failure while applying rolls every backed-up resource
/// back.
pub struct Installer<'r, C> {
    layout: ResourceLayout,
    host: HostController<C>,
    reporter: &'r dyn Reporter,
    options: InstallOptions,
    process_elevated: bool,
}

impl<'r, C: HostControl> Installer<'r, C> {
    pub fn new(layout: ResourceLayout, host: HostController<C>, reporter: &'r dyn Reporter) -> Self {
        Self {
            layout,
            host,
            reporter,
            options: InstallOptions::default(),
            process_elevated: false,
        }
    }

    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_process_elevated(mut self, elevated: bool) -> Self {
        self.process_elevated = elevated;
        self
    }

    pub fn layout(&self) -> &ResourceLayout {
        &self.layout
    }

    pub fn options(&self) -> &InstallOptions {
        &self.options
    }

    pub fn into_host(self) -> HostController<C> {
        self.host
    }

    pub fn install_path(&mut self, package: &Path) -> InstallOutcome {
        self.reporter
            .info(&format!("Opening package {}", package.display()));
        match open_package(package) {
            Ok(archive) => self.install(archive),
            Err(err) => self.abort(err),
        }
    }

    /// Installs from an already opened archive. The archive is closed before
    /// the host is relaunched.
    pub fn install<A: PackageArchive>(&mut self, mut archive: A) -> InstallOutcome {
        let metadata = match read_metadata(&mut archive) {
            Ok(metadata) => metadata,
            Err(err) => return self.abort(err),
        };
        self.reporter.success("Read package metadata");

        let applied = self.apply_package(&mut archive, &metadata);
        drop(archive);
        let applied = match applied {
            Ok(applied) => applied,
            Err(outcome) => return outcome,
        };

        if applied.installed.is_empty() {
            self.reporter.success("Installed package");
        } else {
            self.reporter.success(&format!(
                "Installed resources: {}",
                applied.installed.join(", ")
            ));
        }

        let relaunch = self.relaunch(&metadata);
        InstallOutcome::Success {
            installed: applied.installed,
            plugins: applied.plugins,
            layouts: applied.layouts,
            restored_variables: applied.restored_variables,
            relaunch,
        }
    }

    fn apply_package<A: PackageArchive>(
        &mut self,
        archive: &mut A,
        metadata: &PackageMetadata,
    ) -> Result<Applied, InstallOutcome> {
        let classifier = Classifier::new(self.options.plugin_platform.as_str());
        let plan = InstallPlan::build(archive.entries(), &classifier);
        self.reporter.info(&format!(
            "Found {} resource(s), {} plugin(s), {} layout file(s)",
            plan.resource_names.len(),
            plan.count(EntryCategory::Plugin),
            plan.count(EntryCategory::Layout)
        ));
        tracing::debug!(skipped = plan.skipped.len(), "skipping unclassified entries");

        self.layout
            .ensure_base_dirs()
            .map_err(|err| self.abort(err))?;
        let _lock = InstallLock::acquire(&self.layout).map_err(|err| self.abort(err))?;

        match self.host.quiesce() {
            Ok(QuiesceOutcome::NotRunning) => {
                tracing::debug!("host is not running");
            }
            Ok(QuiesceOutcome::Stopped { forced: true, .. }) => {
                self.reporter
                    .warning("Host did not close on request and was terminated");
            }
            Ok(QuiesceOutcome::Stopped { .. }) => self.reporter.success("Closed host"),
            Err(err) => return Err(self.abort(InstallError::Quiesce(err))),
        }

        let staging = tempfile::Builder::new()
            .prefix("skinpack-")
            .tempdir()
            .io_context(|| "failed to create staging directory".to_string())
            .map_err(|err| self.abort(err))?;

        let preserve_variables = self.options.preserves_variables(metadata.merge_mode);
        let mut backups = BackupManager::new(&self.layout);
        if let Some(mode) = self.options.backup_mode(metadata.merge_mode) {
            for name in &plan.resource_names {
                self.reporter.info(&format!("Backing up {name}"));
                if let Err(err) = backups.backup(name, mode) {
                    if mode == BackupMode::Move {
                        self.report_restore(&backups.restore(&backups.backed_up()));
                    }
                    return Err(self.abort(err));
                }
            }
        }

        let mut applied = Applied {
            installed: plan.resource_names.clone(),
            ..Applied::default()
        };
        let total = plan.entries.len();
        for (index, planned) in plan.entries.iter().enumerate() {
            self.reporter
                .progress(index + 1, total, &planned.entry.name);
            let relative = planned.classification.relative_path.clone();
            let result = match planned.classification.category {
                EntryCategory::Resource => self
                    .apply_resource(archive, planned, metadata, &backups, preserve_variables)
                    .map(|restored| {
                        if restored {
                            applied.restored_variables.push(relative);
                        }
                    }),
                EntryCategory::Plugin => install_plugin(
                    archive,
                    &planned.entry,
                    &self.layout.plugin_path(&relative),
                    staging.path(),
                )
                .map(|action| {
                    self.report_plugin(&relative, &action);
                    applied.plugins.push(PluginReport {
                        file: relative,
                        action,
                    });
                }),
                EntryCategory::Layout => {
                    extract_to(archive, &planned.entry, &self.layout.layout_path(&relative))
                        .map(|()| applied.layouts.push(relative))
                }
                EntryCategory::Unclassified => Ok(()),
            };

            if let Err(err) = result {
                let reason = InstallError::Apply {
                    entry: planned.entry.name.clone(),
                    source: Box::new(err),
                };
                self.reporter.error(&reason.chain());
                self.reporter.info("Restoring backups");
                let restored = backups.restore(&backups.backed_up());
                self.report_restore(&restored);
                return Err(InstallOutcome::RolledBack { reason, restored });
            }
        }

        Ok(applied)
    }

    /// Extracts one resource file and, when it is a listed variable file with
    /// a snapshot from this run, carries the old variables over. Returns
    /// whether variables were carried over.
    fn apply_resource<A: PackageArchive>(
        &self,
        archive: &mut A,
        planned: &PlannedEntry,
        metadata: &PackageMetadata,
        backups: &BackupManager<'_>,
        preserve_variables: bool,
    ) -> Result<bool, InstallError> {
        let relative = &planned.classification.relative_path;
        let destination = self.layout.resource_path(relative);
        extract_to(archive, &planned.entry, &destination)?;

        if !preserve_variables
            || !metadata
                .variable_files
                .iter()
                .any(|listed| same_relative_path(listed, relative))
        {
            return Ok(false);
        }
        let has_snapshot = planned
            .classification
            .resource_name
            .as_deref()
            .and_then(|name| backups.record(name))
            .is_some_and(|record| matches!(record, BackupRecord::Snapshot(_)));
        let backup_file = self.layout.snapshot_path(relative);
        if !has_snapshot || !backup_file.is_file() {
            return Ok(false);
        }

        match restore_variables(&backup_file, &destination) {
            Ok(count) => {
                self.reporter
                    .info(&format!("Restored {count} variable(s) in {relative}"));
                Ok(true)
            }
            Err(err) => {
                self.reporter.warning(&format!(
                    "Failed to restore variables in {relative}: {}",
                    error_chain(&err)
                ));
                Ok(false)
            }
        }
    }

    fn relaunch(&mut self, metadata: &PackageMetadata) -> RelaunchStatus {
        if !self.options.relaunch {
            return RelaunchStatus::Skipped;
        }

        self.reporter.info("Starting host");
        match self
            .host
            .relaunch(self.process_elevated, &metadata.activation)
        {
            Ok(outcome) => {
                if outcome.elevated_fallback {
                    self.reporter.warning("Host could not be started unelevated");
                    self.reporter
                        .warning("Host was started elevated; restart it manually");
                }
                if let Some(command) = &outcome.activation {
                    self.reporter.info(&format!("Sent {command}"));
                }
                self.reporter.success("Started host");
                RelaunchStatus::Started {
                    elevated_fallback: outcome.elevated_fallback,
                }
            }
            Err(err) => {
                let reason = error_chain(&err);
                self.reporter
                    .warning(&format!("Failed to relaunch host: {reason}"));
                RelaunchStatus::Failed { reason }
            }
        }
    }

    fn report_plugin(&self, file: &str, action: &PluginAction) {
        match action {
            PluginAction::Installed => self.reporter.info(&format!("Installed plugin {file}")),
            PluginAction::Upgraded => self.reporter.info(&format!("Upgraded plugin {file}")),
            PluginAction::Kept => self
                .reporter
                .info(&format!("Kept installed plugin {file}; it is not older")),
            PluginAction::Unverified { reason } => self.reporter.warning(&format!(
                "Kept installed plugin {file}; versions could not be compared: {reason}"
            )),
        }
    }

    fn report_restore(&self, report: &RestoreReport) {
        for name in report.restored.iter().chain(&report.removed) {
            self.reporter.info(&format!("Restored {name}"));
        }
        for (name, reason) in &report.failed {
            self.reporter
                .error(&format!("Failed to restore {name}: {reason}"));
        }
    }

    fn abort(&self, err: InstallError) -> InstallOutcome {
        self.reporter.error(&err.chain());
        InstallOutcome::Aborted { reason: err }
    }
}
