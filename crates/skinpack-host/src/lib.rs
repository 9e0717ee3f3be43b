//! Host process lifecycle: detect, quiesce and relaunch the host application
//! around an install.

mod control;
mod controller;
mod error;
mod paths;
mod system;

pub use control::{HostCommand, HostControl};
pub use controller::{HostController, LifecycleConfig, QuiesceOutcome, RelaunchOutcome};
pub use error::HostError;
pub use paths::{HostPaths, HOST_PROGRAM_NAME, HOST_SETTINGS_FILE};
pub use system::{
    current_process_elevated, SystemHostControl, HOST_WINDOW_CLASS, HOST_WINDOW_TITLE,
};
