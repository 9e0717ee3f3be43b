use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use skinpack_core::Reporter;
use skinpack_installer::{InstallOutcome, RelaunchStatus};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(std::io::stdout().is_terminal())
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

fn badge_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "err" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightBlue,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn paint_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => render_status_line(style, status, message),
        OutputStyle::Rich => format!(
            "{} {message}",
            colorize(badge_style(status), status_badge(status))
        ),
    }
}

/// Terminal sink for install progress. Errors and warnings always reach
/// stderr; the rest only shows with `--verbose`.
pub(crate) struct TerminalReporter {
    style: OutputStyle,
    verbose: bool,
    progress: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub(crate) fn new(style: OutputStyle, verbose: bool) -> Self {
        Self {
            style,
            verbose,
            progress: Mutex::new(None),
        }
    }

    pub(crate) fn finish_progress(&self) {
        if let Ok(mut progress) = self.progress.lock() {
            if let Some(bar) = progress.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn emit(&self, to_stderr: bool, status: &str, message: &str) {
        let line = paint_status_line(self.style, status, message);
        let print = || {
            if to_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        };
        match self.progress.lock() {
            Ok(progress) => match progress.as_ref() {
                Some(bar) => bar.suspend(print),
                None => print(),
            },
            Err(_) => print(),
        }
    }

    #[cfg(test)]
    pub(crate) fn has_progress_bar(&self) -> bool {
        self.progress
            .lock()
            .map(|progress| progress.is_some())
            .unwrap_or(false)
    }

    fn new_bar(total: usize) -> ProgressBar {
        let bar = ProgressBar::new(total.max(1) as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.cyan.bold} [{bar:24.cyan/blue}] {pos:>3}/{len:3} {wide_msg}",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }
}

impl Reporter for TerminalReporter {
    fn error(&self, message: &str) {
        self.emit(true, "err", message);
    }

    fn warning(&self, message: &str) {
        self.emit(true, "warn", message);
    }

    fn info(&self, message: &str) {
        if self.verbose {
            self.emit(false, "step", message);
        }
    }

    fn success(&self, message: &str) {
        if self.verbose {
            self.emit(false, "ok", message);
        }
    }

    fn progress(&self, current: usize, total: usize, message: &str) {
        if !self.verbose {
            return;
        }
        if self.style == OutputStyle::Plain {
            self.emit(false, "step", &format!("({current}/{total}) {message}"));
            return;
        }

        let Ok(mut progress) = self.progress.lock() else {
            return;
        };
        let bar = progress.get_or_insert_with(|| Self::new_bar(total));
        bar.set_length(total.max(1) as u64);
        bar.set_position(current.min(total) as u64);
        bar.set_message(message.to_string());
        if current >= total {
            bar.finish_and_clear();
            *progress = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct PluginLine {
    pub(crate) file: String,
    pub(crate) action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RestoreFailure {
    pub(crate) name: String,
    pub(crate) reason: String,
}

/// Machine-readable install outcome printed by `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct OutcomeReport {
    pub(crate) package: String,
    pub(crate) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) failure_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
    pub(crate) installed: Vec<String>,
    pub(crate) plugins: Vec<PluginLine>,
    pub(crate) layouts: Vec<String>,
    pub(crate) restored_variables: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) relaunch: Option<String>,
    pub(crate) restored: Vec<String>,
    pub(crate) restore_failures: Vec<RestoreFailure>,
}

impl OutcomeReport {
    pub(crate) fn from_outcome(package: &Path, outcome: &InstallOutcome) -> Self {
        let mut report = Self {
            package: package.display().to_string(),
            status: outcome.status(),
            failure_kind: outcome.failure_kind().map(|kind| kind.as_str()),
            reason: outcome.reason().map(|reason| reason.chain()),
            installed: Vec::new(),
            plugins: Vec::new(),
            layouts: Vec::new(),
            restored_variables: Vec::new(),
            relaunch: None,
            restored: Vec::new(),
            restore_failures: Vec::new(),
        };

        match outcome {
            InstallOutcome::Success {
                installed,
                plugins,
                layouts,
                restored_variables,
                relaunch,
            } => {
                report.installed = installed.clone();
                report.plugins = plugins
                    .iter()
                    .map(|plugin| PluginLine {
                        file: plugin.file.clone(),
                        action: plugin.action.as_str(),
                    })
                    .collect();
                report.layouts = layouts.clone();
                report.restored_variables = restored_variables.clone();
                report.relaunch = Some(relaunch_label(relaunch));
            }
            InstallOutcome::Aborted { .. } => {}
            InstallOutcome::RolledBack { restored, .. } => {
                report.restored = restored
                    .restored
                    .iter()
                    .chain(&restored.removed)
                    .cloned()
                    .collect();
                report.restore_failures = restored
                    .failed
                    .iter()
                    .map(|(name, reason)| RestoreFailure {
                        name: name.clone(),
                        reason: reason.clone(),
                    })
                    .collect();
            }
        }

        report
    }
}

fn relaunch_label(status: &RelaunchStatus) -> String {
    match status {
        RelaunchStatus::Skipped => "skipped".to_string(),
        RelaunchStatus::Started {
            elevated_fallback: false,
        } => "started".to_string(),
        RelaunchStatus::Started {
            elevated_fallback: true,
        } => "started-elevated".to_string(),
        RelaunchStatus::Failed { reason } => format!("failed: {reason}"),
    }
}

pub(crate) fn format_outcome_lines(outcome: &InstallOutcome, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        InstallOutcome::Success {
            installed,
            plugins,
            layouts,
            restored_variables,
            relaunch,
        } => {
            let summary = if installed.is_empty() {
                "install complete".to_string()
            } else {
                format!("installed {}", installed.join(", "))
            };
            lines.push(render_status_line(style, "ok", &summary));
            for plugin in plugins {
                lines.push(render_status_line(
                    style,
                    "step",
                    &format!("plugin {}: {}", plugin.file, plugin.action.as_str()),
                ));
            }
            if !layouts.is_empty() {
                lines.push(render_status_line(
                    style,
                    "step",
                    &format!("layouts: {}", layouts.join(", ")),
                ));
            }
            if !restored_variables.is_empty() {
                lines.push(render_status_line(
                    style,
                    "step",
                    &format!("kept variables: {}", restored_variables.join(", ")),
                ));
            }
            let relaunch_status = match relaunch {
                RelaunchStatus::Failed { .. } => "warn",
                _ => "step",
            };
            lines.push(render_status_line(
                style,
                relaunch_status,
                &format!("host: {}", relaunch_label(relaunch)),
            ));
        }
        InstallOutcome::Aborted { reason } => {
            lines.push(render_status_line(
                style,
                "err",
                &format!(
                    "install aborted (kind={}): {}",
                    reason.kind().as_str(),
                    reason.chain()
                ),
            ));
        }
        InstallOutcome::RolledBack { reason, restored } => {
            lines.push(render_status_line(
                style,
                "err",
                &format!(
                    "install rolled back (kind={}): {}",
                    reason.kind().as_str(),
                    reason.chain()
                ),
            ));
            for name in restored.restored.iter().chain(&restored.removed) {
                lines.push(render_status_line(
                    style,
                    "step",
                    &format!("restored {name}"),
                ));
            }
            for (name, failure) in &restored.failed {
                lines.push(render_status_line(
                    style,
                    "err",
                    &format!("not restored {name}: {failure}"),
                ));
            }
        }
    }
    lines
}

pub(crate) fn print_install_outcome(outcome: &InstallOutcome, style: OutputStyle) {
    for line in format_outcome_lines(outcome, style) {
        println!("{line}");
    }
}
