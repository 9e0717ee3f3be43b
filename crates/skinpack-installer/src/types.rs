use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use skinpack_core::MetadataError;
use skinpack_host::HostError;
use thiserror::Error;

use crate::ArchiveError;

/// Broad failure classes; each maps onto how far an install got before it
/// stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Backup,
    Mutation,
    Lifecycle,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Backup => "backup",
            Self::Mutation => "mutation",
            Self::Lifecycle => "lifecycle",
        }
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("package {} does not exist", path.display())]
    PackageMissing { path: PathBuf },
    #[error("{} is not a skin package (expected a .rmskin file)", path.display())]
    NotAPackage { path: PathBuf },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("invalid package metadata")]
    Metadata(#[from] MetadataError),
    #[error("host installation is not usable")]
    Host(#[source] HostError),
    #[error("another install holds {}{detail}", path.display())]
    Locked { path: PathBuf, detail: String },
    #[error("host did not shut down")]
    Quiesce(#[source] HostError),
    #[error("failed to back up resource {name}")]
    Backup {
        name: String,
        #[source]
        source: Box<InstallError>,
    },
    #[error("failed to install {entry}")]
    Apply {
        entry: String,
        #[source]
        source: Box<InstallError>,
    },
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PackageMissing { .. }
            | Self::NotAPackage { .. }
            | Self::Archive(_)
            | Self::Metadata(_)
            | Self::Host(_)
            | Self::Locked { .. } => FailureKind::Validation,
            Self::Quiesce(_) => FailureKind::Lifecycle,
            Self::Backup { .. } => FailureKind::Backup,
            Self::Apply { .. } => FailureKind::Mutation,
            // mutation-time I/O arrives wrapped in Backup or Apply; bare I/O
            // errors come from preparing the install
            Self::Io { .. } => FailureKind::Validation,
        }
    }

    /// Renders the error with its whole source chain on one line.
    pub fn chain(&self) -> String {
        error_chain(self)
    }
}

pub fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// `with_context` for `io::Result`, yielding an [`InstallError::Io`].
pub(crate) trait IoContext<T> {
    fn io_context<F>(self, context: F) -> Result<T, InstallError>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F>(self, context: F) -> Result<T, InstallError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| InstallError::Io {
            context: context(),
            source,
        })
    }
}
