use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
const FIXED_FILE_INFO_STRUC_VERSION: u32 = 0x0001_0000;
const FIXED_FILE_INFO_LEN: usize = 52;

#[derive(Debug, Error)]
pub enum VersionReadError {
    #[error("failed to read version of {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} carries no file version resource", path.display())]
    MissingResource { path: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid version descriptor '{0}': expected four dot-separated numbers")]
pub struct VersionParseError(String);

/// Four-part file version of a native binary (major.minor.build.revision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VersionDescriptor {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl VersionDescriptor {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    pub fn read_from_path(path: &Path) -> Result<Self, VersionReadError> {
        let bytes = fs::read(path).map_err(|source| VersionReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read_from_bytes(&bytes).ok_or_else(|| VersionReadError::MissingResource {
            path: path.to_path_buf(),
        })
    }

    /// Locates the first `VS_FIXEDFILEINFO` block in a PE image.
    pub fn read_from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut offset = 0;
        while offset + FIXED_FILE_INFO_LEN <= bytes.len() {
            if read_u32(bytes, offset) == FIXED_FILE_INFO_SIGNATURE
                && read_u32(bytes, offset + 4) == FIXED_FILE_INFO_STRUC_VERSION
            {
                let ms = read_u32(bytes, offset + 8);
                let ls = read_u32(bytes, offset + 12);
                return Some(Self::new(
                    (ms >> 16) as u16,
                    (ms & 0xFFFF) as u16,
                    (ls >> 16) as u16,
                    (ls & 0xFFFF) as u16,
                ));
            }
            offset += 4;
        }
        None
    }

    /// Serializes a `VS_FIXEDFILEINFO` block carrying this file version.
    pub fn to_fixed_file_info(&self) -> Vec<u8> {
        let ms = (u32::from(self.major) << 16) | u32::from(self.minor);
        let ls = (u32::from(self.build) << 16) | u32::from(self.revision);
        let mut out = Vec::with_capacity(FIXED_FILE_INFO_LEN);
        for dword in [
            FIXED_FILE_INFO_SIGNATURE,
            FIXED_FILE_INFO_STRUC_VERSION,
            ms,
            ls,
            ms,
            ls,
        ] {
            out.extend_from_slice(&dword.to_le_bytes());
        }
        out.resize(FIXED_FILE_INFO_LEN, 0);
        out
    }

    /// Major, minor and build decide on their own; when they tie the
    /// revision has to be strictly greater.
    pub fn is_newer_than(&self, installed: &Self) -> bool {
        for (candidate, current) in [
            (self.major, installed.major),
            (self.minor, installed.minor),
            (self.build, installed.build),
        ] {
            match candidate.cmp(&current) {
                Ordering::Greater => return true,
                Ordering::Less => return false,
                Ordering::Equal => {}
            }
        }
        self.revision > installed.revision
    }
}

impl PartialOrd for VersionDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.build, self.revision).cmp(&(
            other.major,
            other.minor,
            other.build,
            other.revision,
        ))
    }
}

impl fmt::Display for VersionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for VersionDescriptor {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts = input
            .trim()
            .split('.')
            .map(|part| part.parse::<u16>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionParseError(input.to_string()))?;
        match parts.as_slice() {
            [major, minor, build, revision] => Ok(Self::new(*major, *minor, *build, *revision)),
            _ => Err(VersionParseError(input.to_string())),
        }
    }
}

/// Decides whether the binary at `candidate` should replace `installed`.
/// A missing installed binary is always superseded.
pub fn is_newer(candidate: &Path, installed: &Path) -> Result<bool, VersionReadError> {
    if !installed.exists() {
        return Ok(true);
    }
    let candidate_version = VersionDescriptor::read_from_path(candidate)?;
    let installed_version = VersionDescriptor::read_from_path(installed)?;
    tracing::debug!(
        candidate = %candidate_version,
        installed = %installed_version,
        "compared plugin versions"
    );
    Ok(candidate_version.is_newer_than(&installed_version))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
