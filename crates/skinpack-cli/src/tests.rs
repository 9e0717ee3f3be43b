use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::error::ErrorKind;
use clap::CommandFactory;
use skinpack_core::{RecordingReporter, ReportLevel, Reporter};
use skinpack_host::HostError;
use skinpack_installer::{
    InstallError, InstallOutcome, PluginAction, PluginReport, RelaunchStatus, RestoreReport,
    ZipPackage,
};

use super::*;
use crate::completion::write_completions_script;
use crate::config::{parse_config, CliConfig, InstallFlags};
use crate::dispatch::inspect_lines;
use crate::render::{
    format_outcome_lines, render_status_line, OutcomeReport, OutputStyle, TerminalReporter,
};

fn build_package(path: &Path, files: &[(&str, &[u8])]) {
    let file = fs::File::create(path).expect("must create package");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, bytes) in files {
        zip.start_file(*name, options).expect("must start entry");
        zip.write_all(bytes).expect("must write entry");
    }
    zip.finish().expect("must finish package");
}

fn success_outcome() -> InstallOutcome {
    InstallOutcome::Success {
        installed: vec!["Foo".to_string(), "Bar".to_string()],
        plugins: vec![PluginReport {
            file: "Thing.dll".to_string(),
            action: PluginAction::Upgraded,
        }],
        layouts: Vec::new(),
        restored_variables: vec!["Foo/Foo.inc".to_string()],
        relaunch: RelaunchStatus::Started {
            elevated_fallback: false,
        },
    }
}

fn rolled_back_outcome() -> InstallOutcome {
    InstallOutcome::RolledBack {
        reason: InstallError::Apply {
            entry: "Resources/Foo/Foo.ini".to_string(),
            source: Box::new(InstallError::Io {
                context: "failed to write Foo.ini".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            }),
        },
        restored: RestoreReport {
            restored: vec!["Foo".to_string()],
            removed: vec!["Bar".to_string()],
            failed: vec![("Baz".to_string(), "access denied".to_string())],
        },
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn install_accepts_short_flags() {
    let cli = Cli::try_parse_from(["skinpack", "install", "Foo.rmskin", "-k", "-x", "-v"])
        .expect("must parse");
    assert!(cli.verbose);
    let Commands::Install {
        package,
        keep_variables,
        no_variables,
        no_restart,
        json,
        ..
    } = cli.command
    else {
        panic!("expected install command");
    };
    assert_eq!(package, PathBuf::from("Foo.rmskin"));
    assert!(keep_variables);
    assert!(!no_variables);
    assert!(no_restart);
    assert!(!json);
}

#[test]
fn keepvars_and_novariables_conflict() {
    let err = Cli::try_parse_from(["skinpack", "install", "Foo.rmskin", "-k", "-n"])
        .expect_err("flags must conflict");
    assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
}

#[test]
fn parse_config_reads_every_section() {
    let config = parse_config(
        r#"
[host]
program_path = "C:/Program Files/Rainmeter/Rainmeter.exe"
settings_path = "C:/Users/me/AppData/Roaming/Rainmeter"
resource_root = "D:/Skins"

[lifecycle]
poll_interval_ms = 10
force_after_polls = 5

[install]
plugin_platform = "32bit"
snapshot_merge = true
"#,
    )
    .expect("must parse config");

    assert_eq!(
        config.host.resource_root.as_deref(),
        Some(Path::new("D:/Skins"))
    );
    let lifecycle = config.lifecycle_config();
    assert_eq!(lifecycle.poll_interval, Duration::from_millis(10));
    assert_eq!(lifecycle.force_after_polls, 5);
    assert_eq!(lifecycle.quiesce_timeout_polls, 100);
    assert_eq!(lifecycle.launch_timeout_polls, 100);
    assert_eq!(config.plugin_platform(), "32bit");
}

#[test]
fn parse_config_rejects_unknown_keys() {
    let err = parse_config("[install]\nplatform = \"64bit\"\n").expect_err("must reject");
    assert!(
        err.to_string().contains("unknown field"),
        "unexpected error: {err}"
    );
}

#[test]
fn empty_config_keeps_defaults() {
    let config = parse_config("").expect("empty config is valid");
    assert_eq!(config, CliConfig::default());
    assert_eq!(config.plugin_platform(), "64bit");

    let options = config.install_options(InstallFlags::default());
    assert!(options.relaunch);
    assert!(!options.snapshot_merge);
    assert_eq!(options.plugin_platform, "64bit");
}

#[test]
fn install_flags_override_config() {
    let config = parse_config("[install]\nsnapshot_merge = false\n").expect("must parse");
    let options = config.install_options(InstallFlags {
        keep_variables: true,
        no_restart: true,
        snapshot_merge: true,
        ..InstallFlags::default()
    });
    assert!(options.keep_variables);
    assert!(!options.relaunch);
    assert!(options.snapshot_merge);
}

#[test]
fn configured_host_paths_skip_discovery() {
    let config = parse_config(
        "[host]\nprogram_path = \"/opt/host/Rainmeter.exe\"\nsettings_path = \"/home/me/.host\"\nresource_root = \"/srv/skins\"\n",
    )
    .expect("must parse");
    let paths = config.host_paths().expect("must build host paths");
    assert_eq!(paths.program_path(), Path::new("/opt/host/Rainmeter.exe"));
    assert_eq!(paths.settings_dir(), Path::new("/home/me/.host"));
}

#[test]
fn configured_resource_root_is_created_without_settings() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("Skins");
    let config = CliConfig {
        host: config::HostSection {
            program_path: Some(temp.path().join("Rainmeter.exe")),
            settings_path: Some(temp.path().join("settings")),
            resource_root: Some(root.clone()),
        },
        ..CliConfig::default()
    };
    let paths = config.host_paths().expect("must build host paths");
    assert_eq!(paths.resource_root().expect("must resolve root"), root);
    assert!(root.is_dir());
}

#[test]
fn missing_host_aborts_install_as_validation_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = CliConfig {
        host: config::HostSection {
            program_path: Some(temp.path().join("missing/Rainmeter.exe")),
            settings_path: Some(temp.path().join("settings")),
            resource_root: Some(temp.path().join("Skins")),
        },
        ..CliConfig::default()
    };
    let package = temp.path().join("Foo.rmskin");
    build_package(&package, &[("RMSKIN.ini", b"[rmskin]\n")]);

    let reporter = RecordingReporter::new();
    let outcome = dispatch::run_install(&config, &package, InstallFlags::default(), &reporter);

    assert!(matches!(
        outcome,
        InstallOutcome::Aborted {
            reason: InstallError::Host(HostError::NotInstalled { .. })
        }
    ));
    assert_eq!(reporter.messages_at(ReportLevel::Error).len(), 1);
    assert!(!temp.path().join("Skins").exists());
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "installed Foo"),
        "installed Foo"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "installed Foo"),
        "[OK] installed Foo"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "host: failed"),
        "[WARN] host: failed"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "step", "plugin Thing.dll: kept"),
        "[..] plugin Thing.dll: kept"
    );
}

#[test]
fn rich_progress_bar_needs_verbose() {
    let quiet = TerminalReporter::new(OutputStyle::Rich, false);
    quiet.progress(1, 3, "Resources/Foo/Foo.ini");
    assert!(!quiet.has_progress_bar());

    let verbose = TerminalReporter::new(OutputStyle::Rich, true);
    verbose.progress(1, 3, "Resources/Foo/Foo.ini");
    assert!(verbose.has_progress_bar());
    verbose.progress(3, 3, "Resources/Foo/Bar.ini");
    assert!(!verbose.has_progress_bar(), "bar is cleared on the last entry");
}

#[test]
fn success_lines_summarize_install() {
    let lines = format_outcome_lines(&success_outcome(), OutputStyle::Rich);
    assert_eq!(
        lines,
        vec![
            "[OK] installed Foo, Bar",
            "[..] plugin Thing.dll: upgraded",
            "[..] kept variables: Foo/Foo.inc",
            "[..] host: started",
        ]
    );
}

#[test]
fn rollback_lines_list_restored_resources() {
    let lines = format_outcome_lines(&rolled_back_outcome(), OutputStyle::Plain);
    assert_eq!(
        lines,
        vec![
            "install rolled back (kind=mutation): failed to install Resources/Foo/Foo.ini: failed to write Foo.ini: disk full",
            "restored Foo",
            "restored Bar",
            "not restored Baz: access denied",
        ]
    );
}

#[test]
fn outcome_report_serializes_success() {
    let report = OutcomeReport::from_outcome(Path::new("Foo.rmskin"), &success_outcome());
    let value = serde_json::to_value(&report).expect("must serialize");
    assert_eq!(value["status"], "success");
    assert_eq!(value["installed"], serde_json::json!(["Foo", "Bar"]));
    assert_eq!(value["plugins"][0]["action"], "upgraded");
    assert_eq!(value["relaunch"], "started");
    assert!(value.get("failure_kind").is_none());
}

#[test]
fn outcome_report_serializes_rollback() {
    let report = OutcomeReport::from_outcome(Path::new("Foo.rmskin"), &rolled_back_outcome());
    let value = serde_json::to_value(&report).expect("must serialize");
    assert_eq!(value["status"], "rolled_back");
    assert_eq!(value["failure_kind"], "mutation");
    assert_eq!(value["restored"], serde_json::json!(["Foo", "Bar"]));
    assert_eq!(value["restore_failures"][0]["name"], "Baz");
    assert!(value.get("relaunch").is_none());
}

#[test]
fn inspect_lists_metadata_and_destinations() {
    let temp = tempfile::tempdir().expect("tempdir");
    let package = temp.path().join("Foo.rmskin");
    build_package(
        &package,
        &[
            (
                "RMSKIN.ini",
                b"[rmskin]\nName=Foo\nAuthor=someone\nVersion=1.2\nMergeSkins=1\nVariableFiles=Foo\\Vars.inc\nLoadType=Skin\nLoad=Foo\\Foo.ini\n",
            ),
            ("Skins/Foo/Foo.ini", b"[Rainmeter]\n"),
            ("Plugins/64bit/Thing.dll", b"MZ"),
            ("Plugins/32bit/Thing.dll", b"MZ"),
            ("Layouts/Desk/Rainmeter.ini", b"[Rainmeter]\n"),
        ],
    );

    let mut archive = ZipPackage::open(&package).expect("must open package");
    let lines = inspect_lines(&mut archive, "64bit").expect("must inspect");
    assert_eq!(
        lines,
        vec![
            "name: Foo",
            "author: someone",
            "version: 1.2",
            "mode: merge",
            "variable_files: Foo\\Vars.inc",
            "load: skin Foo\\Foo.ini",
            "entries:",
            "  skip     RMSKIN.ini",
            "  resource Skins/Foo/Foo.ini -> Foo/Foo.ini",
            "  plugin   Plugins/64bit/Thing.dll -> Thing.dll",
            "  skip     Plugins/32bit/Thing.dll",
            "  layout   Layouts/Desk/Rainmeter.ini -> Desk/Rainmeter.ini",
        ]
    );
}

#[test]
fn bash_completions_name_the_binary() {
    let mut output = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut output).expect("must generate");
    let script = String::from_utf8(output).expect("utf8 script");
    assert!(script.contains("skinpack"));
    assert!(script.contains("install"));
}
