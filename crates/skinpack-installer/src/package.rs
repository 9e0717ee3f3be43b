use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use skinpack_core::{PackageMetadata, METADATA_ENTRY};
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::fs_utils::ensure_parent_dir;
use crate::InstallError;

pub const PACKAGE_EXTENSION: &str = "rmskin";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open package {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("package {} is not a readable archive", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("package has no entry named {name}")]
    MissingEntry { name: String },
    #[error("failed to read package entry {name}")]
    Entry {
        name: String,
        #[source]
        source: ZipError,
    },
    #[error("failed to extract {name} to {}", path.display())]
    Extract {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("refusing to overwrite {}", path.display())]
    Exists { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Full entry path as stored in the archive.
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Read access to a package container.
pub trait PackageArchive {
    /// Entries in archive order.
    fn entries(&self) -> &[PackageEntry];

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError>;

    fn extract(
        &mut self,
        entry: &PackageEntry,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), ArchiveError>;
}

pub struct ZipPackage {
    path: PathBuf,
    archive: ZipArchive<File>,
    entries: Vec<PackageEntry>,
}

impl ZipPackage {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|source| ArchiveError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index(index)
                .map_err(|source| ArchiveError::Invalid {
                    path: path.to_path_buf(),
                    source,
                })?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                size: file.size(),
                is_dir: file.is_dir(),
            });
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened package");

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PackageArchive for ZipPackage {
    fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut file = self.archive.by_name(name).map_err(|source| match source {
            ZipError::FileNotFound => ArchiveError::MissingEntry {
                name: name.to_string(),
            },
            source => ArchiveError::Entry {
                name: name.to_string(),
                source,
            },
        })?;
        let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut bytes)
            .map_err(|source| ArchiveError::Entry {
                name: name.to_string(),
                source: ZipError::Io(source),
            })?;
        Ok(bytes)
    }

    fn extract(
        &mut self,
        entry: &PackageEntry,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), ArchiveError> {
        if !overwrite && destination.exists() {
            return Err(ArchiveError::Exists {
                path: destination.to_path_buf(),
            });
        }
        let extract_err = |source: io::Error| ArchiveError::Extract {
            name: entry.name.clone(),
            path: destination.to_path_buf(),
            source,
        };

        let mut file = self
            .archive
            .by_name(&entry.name)
            .map_err(|source| ArchiveError::Entry {
                name: entry.name.clone(),
                source,
            })?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(extract_err)?;
        }
        let mut out = File::create(destination).map_err(extract_err)?;
        io::copy(&mut file, &mut out).map_err(extract_err)?;
        Ok(())
    }
}

/// Opens the package at `path` after checking that it exists and carries the
/// package extension.
pub fn open_package(path: &Path) -> Result<ZipPackage, InstallError> {
    if !path.is_file() {
        return Err(InstallError::PackageMissing {
            path: path.to_path_buf(),
        });
    }
    let is_package = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case(PACKAGE_EXTENSION));
    if !is_package {
        return Err(InstallError::NotAPackage {
            path: path.to_path_buf(),
        });
    }
    Ok(ZipPackage::open(path)?)
}

pub fn read_metadata<A: PackageArchive + ?Sized>(
    archive: &mut A,
) -> Result<PackageMetadata, InstallError> {
    let bytes = archive.read_entry(METADATA_ENTRY)?;
    Ok(PackageMetadata::from_bytes(&bytes)?)
}

/// Extracts `entry` to `destination`, creating parent directories.
pub(crate) fn extract_to<A: PackageArchive + ?Sized>(
    archive: &mut A,
    entry: &PackageEntry,
    destination: &Path,
) -> Result<(), InstallError> {
    ensure_parent_dir(destination)?;
    archive.extract(entry, destination, true)?;
    Ok(())
}
