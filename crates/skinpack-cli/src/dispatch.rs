use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use skinpack_core::{ActivationKind, Classifier, EntryCategory, Reporter};
use skinpack_host::{current_process_elevated, HostController, SystemHostControl};
use skinpack_installer::{
    error_chain, open_package, read_metadata, InstallError, InstallOutcome, Installer,
    PackageArchive, ResourceLayout,
};

use crate::completion::write_completions_script;
use crate::config::{load_config, CliConfig, InstallFlags};
use crate::render::{
    current_output_style, print_install_outcome, OutcomeReport, OutputStyle, TerminalReporter,
};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Install {
            package,
            keep_variables,
            no_variables,
            no_restart,
            snapshot_merge,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let flags = InstallFlags {
                keep_variables,
                no_variables,
                no_restart,
                snapshot_merge,
            };
            let style = if json {
                OutputStyle::Plain
            } else {
                current_output_style()
            };
            let reporter = TerminalReporter::new(style, cli.verbose && !json);

            let outcome = run_install(&config, &package, flags, &reporter);
            reporter.finish_progress();

            if json {
                let report = OutcomeReport::from_outcome(&package, &outcome);
                let rendered = serde_json::to_string_pretty(&report)
                    .context("failed to serialize install outcome")?;
                println!("{rendered}");
            } else {
                print_install_outcome(&outcome, style);
            }
            Ok(exit_code_for(&outcome))
        }
        Commands::Inspect { package, platform } => {
            let config = load_config(cli.config.as_deref())?;
            let platform = platform.unwrap_or_else(|| config.plugin_platform().to_string());
            let mut archive = open_package(&package)
                .with_context(|| format!("failed to open package {}", package.display()))?;
            for line in inspect_lines(&mut archive, &platform)? {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout().lock();
            write_completions_script(shell, &mut stdout)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

pub(crate) fn exit_code_for(outcome: &InstallOutcome) -> ExitCode {
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Resolves the host's locations and runs one install against the live
/// host. Failing to locate the host aborts before the package is opened.
pub(crate) fn run_install(
    config: &CliConfig,
    package: &Path,
    flags: InstallFlags,
    reporter: &dyn Reporter,
) -> InstallOutcome {
    let prepared = config.host_paths().and_then(|paths| {
        paths.ensure_installed()?;
        let resource_root = paths.resource_root()?;
        Ok((paths, resource_root))
    });
    let (paths, resource_root) = match prepared {
        Ok(prepared) => prepared,
        Err(err) => {
            reporter.error(&error_chain(&err));
            return InstallOutcome::Aborted {
                reason: InstallError::Host(err),
            };
        }
    };

    let elevated = current_process_elevated();
    tracing::debug!(
        program = %paths.program_path().display(),
        resource_root = %resource_root.display(),
        elevated,
        "resolved host"
    );

    let host = HostController::new(
        SystemHostControl::new(&paths, elevated),
        config.lifecycle_config(),
    );
    let layout = ResourceLayout::new(resource_root, paths.settings_dir());
    let mut installer = Installer::new(layout, host, reporter)
        .with_options(config.install_options(flags))
        .with_process_elevated(elevated);
    installer.install_path(package)
}

pub(crate) fn inspect_lines<A: PackageArchive + ?Sized>(
    archive: &mut A,
    platform: &str,
) -> Result<Vec<String>> {
    let metadata = read_metadata(archive).context("failed to read package metadata")?;
    let mut lines = Vec::new();

    for (label, value) in [
        ("name", &metadata.name),
        ("author", &metadata.author),
        ("version", &metadata.version),
    ] {
        if let Some(value) = value {
            lines.push(format!("{label}: {value}"));
        }
    }
    lines.push(format!(
        "mode: {}",
        if metadata.merge_mode { "merge" } else { "replace" }
    ));
    if !metadata.variable_files.is_empty() {
        lines.push(format!(
            "variable_files: {}",
            metadata.variable_files.join(", ")
        ));
    }
    if metadata.activation.is_none() {
        lines.push("load: none".to_string());
    } else {
        let kind = match metadata.activation.kind {
            ActivationKind::Resource => "skin",
            ActivationKind::Layout | ActivationKind::None => "layout",
        };
        lines.push(format!("load: {kind} {}", metadata.activation.target));
    }

    let classifier = Classifier::new(platform);
    lines.push("entries:".to_string());
    for entry in archive.entries().iter().filter(|entry| !entry.is_dir) {
        let classification = classifier.classify(&entry.name);
        let line = match classification.category {
            EntryCategory::Unclassified => format!("  skip     {}", entry.name),
            category => format!(
                "  {:<8} {} -> {}",
                category.as_str(),
                entry.name,
                classification.relative_path
            ),
        };
        lines.push(line);
    }

    Ok(lines)
}
