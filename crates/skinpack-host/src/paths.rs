use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use skinpack_core::SectionStore;

use crate::HostError;

pub const HOST_PROGRAM_NAME: &str = "Rainmeter.exe";
pub const HOST_SETTINGS_FILE: &str = "Rainmeter.ini";
const HOST_DIR_NAME: &str = "Rainmeter";
const SETTINGS_SECTION: &str = "Rainmeter";
const RESOURCE_ROOT_KEY: &str = "SkinPath";

/// Where the host program and its per-user settings live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    program_path: PathBuf,
    settings_dir: PathBuf,
    resource_root: Option<PathBuf>,
}

impl HostPaths {
    pub fn new(program_path: impl Into<PathBuf>, settings_dir: impl Into<PathBuf>) -> Self {
        Self {
            program_path: program_path.into(),
            settings_dir: settings_dir.into(),
            resource_root: None,
        }
    }

    /// Default per-user installation: `%ProgramFiles%\Rainmeter\Rainmeter.exe`
    /// with settings under `%APPDATA%\Rainmeter`.
    pub fn discover() -> Result<Self, HostError> {
        let program_files = env_dir("ProgramFiles")?;
        let app_data = env_dir("APPDATA")?;
        Ok(Self::new(
            program_files.join(HOST_DIR_NAME).join(HOST_PROGRAM_NAME),
            app_data.join(HOST_DIR_NAME),
        ))
    }

    /// Pins the resource root instead of reading it from the host settings.
    pub fn with_resource_root(mut self, resource_root: impl Into<PathBuf>) -> Self {
        self.resource_root = Some(resource_root.into());
        self
    }

    pub fn with_program_path(mut self, program_path: impl Into<PathBuf>) -> Self {
        self.program_path = program_path.into();
        self
    }

    pub fn with_settings_dir(mut self, settings_dir: impl Into<PathBuf>) -> Self {
        self.settings_dir = settings_dir.into();
        self
    }

    pub fn program_path(&self) -> &Path {
        &self.program_path
    }

    pub fn settings_dir(&self) -> &Path {
        &self.settings_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.settings_dir.join(HOST_SETTINGS_FILE)
    }

    pub fn ensure_installed(&self) -> Result<(), HostError> {
        if !self.program_path.is_file() {
            return Err(HostError::NotInstalled {
                path: self.program_path.clone(),
            });
        }
        Ok(())
    }

    /// Resolves the directory resources are installed into, creating it when
    /// the host settings name one that does not exist yet.
    pub fn resource_root(&self) -> Result<PathBuf, HostError> {
        let root = match &self.resource_root {
            Some(root) => root.clone(),
            None => self.configured_resource_root()?,
        };
        fs::create_dir_all(&root).map_err(|source| HostError::ResourceRoot {
            path: root.clone(),
            source,
        })?;
        Ok(root)
    }

    fn configured_resource_root(&self) -> Result<PathBuf, HostError> {
        let settings_file = self.settings_file();
        if !settings_file.is_file() {
            return Err(HostError::NotInitialized {
                path: settings_file,
            });
        }
        let store = SectionStore::open(&settings_file)?;
        let configured = store.read(SETTINGS_SECTION, RESOURCE_ROOT_KEY);
        let configured = configured.trim();
        if configured.is_empty() {
            return Err(HostError::MissingResourceRoot {
                path: settings_file,
            });
        }
        Ok(PathBuf::from(configured))
    }
}

fn env_dir(var: &'static str) -> Result<PathBuf, HostError> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or(HostError::MissingEnvironment { var })
}
