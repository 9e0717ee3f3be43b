use std::io;
use std::path::PathBuf;

use skinpack_core::SectionStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host program not found at {}", path.display())]
    NotInstalled { path: PathBuf },
    #[error("host settings file {} does not exist; the host has not been run yet", path.display())]
    NotInitialized { path: PathBuf },
    #[error("host settings {} do not name a resource root", path.display())]
    MissingResourceRoot { path: PathBuf },
    #[error("environment variable {var} is not set")]
    MissingEnvironment { var: &'static str },
    #[error("failed to read host settings")]
    Settings(#[from] SectionStoreError),
    #[error("failed to create resource root {}", path.display())]
    ResourceRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{context}")]
    Spawn {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to terminate host process: {0}")]
    Terminate(String),
    #[error("host did not stop within {polls} polls")]
    QuiesceTimeout { polls: u32 },
    #[error("host did not start within {polls} polls")]
    LaunchTimeout { polls: u32 },
}
