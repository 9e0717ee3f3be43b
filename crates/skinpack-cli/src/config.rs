use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use skinpack_core::DEFAULT_PLUGIN_PLATFORM;
use skinpack_host::{HostError, HostPaths, LifecycleConfig};
use skinpack_installer::InstallOptions;

/// Optional overrides read from a TOML file. Every key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CliConfig {
    pub(crate) host: HostSection,
    pub(crate) lifecycle: LifecycleSection,
    pub(crate) install: InstallSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct HostSection {
    pub(crate) program_path: Option<PathBuf>,
    pub(crate) settings_path: Option<PathBuf>,
    pub(crate) resource_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LifecycleSection {
    pub(crate) poll_interval_ms: Option<u64>,
    pub(crate) quiesce_timeout_polls: Option<u32>,
    pub(crate) force_after_polls: Option<u32>,
    pub(crate) unelevated_launch_polls: Option<u32>,
    pub(crate) launch_timeout_polls: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct InstallSection {
    pub(crate) plugin_platform: Option<String>,
    pub(crate) snapshot_merge: Option<bool>,
}

/// Flags from the `install` subcommand that shape [`InstallOptions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct InstallFlags {
    pub(crate) keep_variables: bool,
    pub(crate) no_variables: bool,
    pub(crate) no_restart: bool,
    pub(crate) snapshot_merge: bool,
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

pub(crate) fn parse_config(raw: &str) -> Result<CliConfig> {
    Ok(toml::from_str(raw)?)
}

impl CliConfig {
    pub(crate) fn lifecycle_config(&self) -> LifecycleConfig {
        let defaults = LifecycleConfig::default();
        let section = &self.lifecycle;
        LifecycleConfig {
            poll_interval: section
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            quiesce_timeout_polls: section
                .quiesce_timeout_polls
                .unwrap_or(defaults.quiesce_timeout_polls),
            force_after_polls: section
                .force_after_polls
                .unwrap_or(defaults.force_after_polls),
            unelevated_launch_polls: section
                .unelevated_launch_polls
                .unwrap_or(defaults.unelevated_launch_polls),
            launch_timeout_polls: section
                .launch_timeout_polls
                .unwrap_or(defaults.launch_timeout_polls),
        }
    }

    pub(crate) fn plugin_platform(&self) -> &str {
        self.install
            .plugin_platform
            .as_deref()
            .unwrap_or(DEFAULT_PLUGIN_PLATFORM)
    }

    /// Flags win over file values; file values win over defaults.
    pub(crate) fn install_options(&self, flags: InstallFlags) -> InstallOptions {
        InstallOptions {
            keep_variables: flags.keep_variables,
            no_variables: flags.no_variables,
            relaunch: !flags.no_restart,
            snapshot_merge: flags.snapshot_merge
                || self.install.snapshot_merge.unwrap_or(false),
            plugin_platform: self.plugin_platform().to_string(),
        }
    }

    /// Host locations from the configured paths, discovering whatever is
    /// left unset from the environment.
    pub(crate) fn host_paths(&self) -> Result<HostPaths, HostError> {
        let host = &self.host;
        let mut paths = match (&host.program_path, &host.settings_path) {
            (Some(program), Some(settings)) => HostPaths::new(program, settings),
            (Some(program), None) => HostPaths::discover()?.with_program_path(program),
            (None, Some(settings)) => HostPaths::discover()?.with_settings_dir(settings),
            (None, None) => HostPaths::discover()?,
        };
        if let Some(root) = &host.resource_root {
            paths = paths.with_resource_root(root);
        }
        Ok(paths)
    }
}
