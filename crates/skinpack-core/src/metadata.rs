use thiserror::Error;

use crate::section_store::{SectionStore, SectionStoreError};

pub const METADATA_ENTRY: &str = "RMSKIN.ini";
pub const METADATA_SECTION: &str = "rmskin";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("package metadata is missing section [{METADATA_SECTION}]")]
    MissingSection(#[source] SectionStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    Resource,
    Layout,
    None,
}

impl ActivationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Layout => "layout",
            Self::None => "none",
        }
    }
}

/// What the host should load once it has been relaunched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub kind: ActivationKind,
    pub target: String,
}

impl Activation {
    pub fn none() -> Self {
        Self {
            kind: ActivationKind::None,
            target: String::new(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == ActivationKind::None || self.target.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub merge_mode: bool,
    pub variable_files: Vec<String>,
    pub activation: Activation,
    pub name: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
}

impl PackageMetadata {
    pub fn from_store(store: &SectionStore) -> Result<Self, MetadataError> {
        store
            .read_section(METADATA_SECTION)
            .map_err(MetadataError::MissingSection)?;

        let merge_mode = store.read(METADATA_SECTION, "MergeSkins").trim() == "1";
        let variable_files =
            parse_variable_files(&store.read(METADATA_SECTION, "VariableFiles"));

        let target = store.read(METADATA_SECTION, "Load").trim().to_string();
        let activation = if target.is_empty() {
            Activation::none()
        } else if store.read(METADATA_SECTION, "LoadType").trim() == "Skin" {
            Activation {
                kind: ActivationKind::Resource,
                target,
            }
        } else {
            Activation {
                kind: ActivationKind::Layout,
                target,
            }
        };

        Ok(Self {
            merge_mode,
            variable_files,
            activation,
            name: optional(store.read(METADATA_SECTION, "Name")),
            author: optional(store.read(METADATA_SECTION, "Author")),
            version: optional(store.read(METADATA_SECTION, "Version")),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetadataError> {
        Self::from_store(&SectionStore::from_bytes(bytes))
    }
}

/// Splits a `|`-delimited list, trimming items and dropping empty ones.
/// Later duplicates are dropped so the original order is kept.
pub fn parse_variable_files(raw: &str) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for item in raw.split('|') {
        let item = item.trim();
        if item.is_empty() || files.iter().any(|existing| existing == item) {
            continue;
        }
        files.push(item.to_string());
    }
    files
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
