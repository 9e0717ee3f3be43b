use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use sysinfo::{Pid, System};

use crate::{HostCommand, HostControl, HostError, HostPaths, HOST_PROGRAM_NAME};

/// Window class of the host's hidden control window.
pub const HOST_WINDOW_CLASS: &str = "DummyRainWClass";
/// Title of the host's hidden control window.
pub const HOST_WINDOW_TITLE: &str = "Rainmeter control window";

/// Drives the real host process. On Windows the host counts as running while
/// its control window exists; elsewhere the process table decides.
/// Termination always goes through the process table.
pub struct SystemHostControl {
    program_path: std::path::PathBuf,
    process_name: String,
    process_elevated: bool,
    system: System,
    // `program <bang>` invocations that have not exited yet
    pending_commands: Vec<Child>,
}

impl SystemHostControl {
    pub fn new(paths: &HostPaths, process_elevated: bool) -> Self {
        let process_name = paths
            .program_path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| HOST_PROGRAM_NAME.to_string());
        Self {
            program_path: paths.program_path().to_path_buf(),
            process_name,
            process_elevated,
            system: System::new(),
            pending_commands: Vec::new(),
        }
    }

    pub fn program_path(&self) -> &Path {
        &self.program_path
    }

    fn matches_host(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.process_name)
            || Path::new(&self.process_name)
                .file_stem()
                .is_some_and(|stem| name.eq_ignore_ascii_case(&stem.to_string_lossy()))
    }

    /// Host processes in the process table, leaving out the short-lived
    /// command invocations started by `send_command`.
    fn host_pids(&mut self) -> Vec<Pid> {
        self.pending_commands
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
        self.system.refresh_processes();
        self.system
            .processes()
            .iter()
            .filter(|(pid, process)| {
                self.matches_host(process.name())
                    && !self
                        .pending_commands
                        .iter()
                        .any(|child| child.id() == pid.as_u32())
            })
            .map(|(pid, _)| *pid)
            .collect()
    }

    fn spawn(&self, command: &mut Command, context: &str) -> Result<Child, HostError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HostError::Spawn {
                context: context.to_string(),
                source,
            })
    }
}

impl HostControl for SystemHostControl {
    #[cfg(windows)]
    fn is_running(&mut self) -> bool {
        self.pending_commands
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
        host_window_present()
    }

    #[cfg(not(windows))]
    fn is_running(&mut self) -> bool {
        !self.host_pids().is_empty()
    }

    fn send_command(&mut self, command: &HostCommand) -> Result<(), HostError> {
        let rendered = command.render();
        tracing::debug!(command = %rendered, "sending host command");
        let child = self.spawn(
            Command::new(&self.program_path).arg(&rendered),
            &format!("failed to send {rendered} to {}", self.program_path.display()),
        )?;
        self.pending_commands.push(child);
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), HostError> {
        let pids = self.host_pids();
        let killed = pids
            .iter()
            .filter_map(|pid| self.system.process(*pid))
            .filter(|process| process.kill())
            .count();
        tracing::debug!(matched = pids.len(), killed, "terminated host processes");
        if !pids.is_empty() && killed == 0 {
            return Err(HostError::Terminate(format!(
                "no {} process accepted the kill signal",
                self.process_name
            )));
        }
        Ok(())
    }

    fn start(&mut self, elevated: bool) -> Result<(), HostError> {
        let context = format!("failed to start {}", self.program_path.display());
        if self.process_elevated && !elevated {
            return self
                .spawn(&mut unelevated_launch(&self.program_path), &context)
                .map(drop);
        }
        self.spawn(&mut Command::new(&self.program_path), &context)
            .map(drop)
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[cfg(windows)]
fn host_window_present() -> bool {
    use windows_sys::Win32::UI::WindowsAndMessaging::FindWindowW;

    let class = wide_null(HOST_WINDOW_CLASS);
    let title = wide_null(HOST_WINDOW_TITLE);
    // SAFETY: both pointers reference NUL-terminated UTF-16 buffers that
    // live until the call returns.
    let window = unsafe { FindWindowW(class.as_ptr(), title.as_ptr()) };
    !window.is_null()
}

#[cfg(any(windows, test))]
pub(crate) fn wide_null(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Launching through the shell hands the new process the desktop user's
/// token rather than ours.
#[cfg(windows)]
fn unelevated_launch(program: &Path) -> Command {
    let mut command = Command::new("explorer.exe");
    command.arg(program);
    command
}

#[cfg(not(windows))]
fn unelevated_launch(program: &Path) -> Command {
    Command::new(program)
}

/// Whether this process runs with administrative rights.
#[cfg(windows)]
pub fn current_process_elevated() -> bool {
    // `net session` is refused to unelevated callers
    Command::new("net")
        .arg("session")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(unix)]
pub fn current_process_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(any(unix, windows)))]
pub fn current_process_elevated() -> bool {
    false
}
