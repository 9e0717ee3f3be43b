use std::fmt;
use std::time::Duration;

use skinpack_core::{Activation, ActivationKind};

use crate::HostError;

/// Control strings understood by the host's command-line bang interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Quit,
    ActivateConfig { folder: String, file: String },
    LoadLayout { name: String },
}

impl HostCommand {
    /// Maps a package activation onto the command that performs it. A
    /// resource target is split at its last separator into folder and file;
    /// a target without a separator activates the folder alone.
    pub fn from_activation(activation: &Activation) -> Option<Self> {
        if activation.is_none() {
            return None;
        }
        let target = activation.target.trim();
        match activation.kind {
            ActivationKind::Resource => {
                let (folder, file) = match target.rfind(['\\', '/']) {
                    Some(idx) => (&target[..idx], &target[idx + 1..]),
                    None => (target, ""),
                };
                Some(Self::ActivateConfig {
                    folder: folder.to_string(),
                    file: file.to_string(),
                })
            }
            ActivationKind::Layout => Some(Self::LoadLayout {
                name: target.to_string(),
            }),
            ActivationKind::None => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Quit => "[!Quit]".to_string(),
            Self::ActivateConfig { folder, file } if file.is_empty() => {
                format!("[!ActivateConfig \"{folder}\"]")
            }
            Self::ActivateConfig { folder, file } => {
                format!("[!ActivateConfig \"{folder}\" \"{file}\"]")
            }
            Self::LoadLayout { name } => format!("[!LoadLayout \"{name}\"]"),
        }
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// OS-facing primitives the lifecycle controller drives.
///
/// Production code talks to real processes through
/// [`crate::SystemHostControl`]; tests substitute a scripted implementation so
/// poll loops run without sleeping or spawning anything.
pub trait HostControl {
    fn is_running(&mut self) -> bool;

    fn send_command(&mut self, command: &HostCommand) -> Result<(), HostError>;

    /// Forcibly terminates every host process.
    fn terminate(&mut self) -> Result<(), HostError>;

    /// Launches the host. `elevated == false` asks for a launch without the
    /// installer's own elevated rights where the platform supports that.
    fn start(&mut self, elevated: bool) -> Result<(), HostError>;

    fn sleep(&mut self, duration: Duration);
}

impl<T: HostControl + ?Sized> HostControl for &mut T {
    fn is_running(&mut self) -> bool {
        (**self).is_running()
    }
    fn send_command(&mut self, command: &HostCommand) -> Result<(), HostError> {
        (**self).send_command(command)
    }
    fn terminate(&mut self) -> Result<(), HostError> {
        (**self).terminate()
    }
    fn start(&mut self, elevated: bool) -> Result<(), HostError> {
        (**self).start(elevated)
    }
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}
