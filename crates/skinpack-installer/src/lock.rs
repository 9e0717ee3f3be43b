use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sysinfo::{Pid, System};

use crate::fs_utils::ensure_parent_dir;
use crate::types::{InstallError, IoContext};
use crate::ResourceLayout;

/// Exclusive claim on a resource root for the duration of one install.
/// Released when dropped.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    /// Claims the lock. A marker left behind by a process that is no longer
    /// alive is removed and claimed once; a live or unreadable marker yields
    /// `Locked`.
    pub fn acquire(layout: &ResourceLayout) -> Result<Self, InstallError> {
        let path = layout.lock_path();
        ensure_parent_dir(&path)?;

        let mut reclaimed = false;
        let mut file = loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => break file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    let holder = read_holder(&path);
                    match holder.as_deref().and_then(|raw| raw.parse::<u32>().ok()) {
                        Some(pid) if !reclaimed && !process_alive(pid) => {
                            tracing::warn!(
                                path = %path.display(),
                                pid,
                                "removing install lock left by an exited process"
                            );
                            match fs::remove_file(&path) {
                                Ok(()) => {}
                                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                                Err(err) => {
                                    return Err(err).io_context(|| {
                                        format!(
                                            "failed to remove stale install lock {}",
                                            path.display()
                                        )
                                    });
                                }
                            }
                            reclaimed = true;
                        }
                        _ => {
                            let detail = holder
                                .map(|pid| format!(" (pid={pid})"))
                                .unwrap_or_default();
                            return Err(InstallError::Locked { path, detail });
                        }
                    }
                }
                Err(err) => {
                    return Err(err)
                        .io_context(|| format!("failed to claim install lock {}", path.display()));
                }
            }
        };

        let lock = Self { path };
        file.write_all(format!("{}\n", std::process::id()).as_bytes())
            .and_then(|()| file.flush())
            .io_context(|| format!("failed to write install lock {}", lock.path.display()))?;
        tracing::debug!(path = %lock.path.display(), reclaimed, "acquired install lock");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release install lock");
        }
    }
}

fn read_holder(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|pid| !pid.is_empty())
}

fn process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    let mut system = System::new();
    system.refresh_processes();
    system.process(Pid::from_u32(pid)).is_some()
}
