pub const DEFAULT_PLUGIN_PLATFORM: &str = "64bit";
pub const BACKUP_DIR_NAME: &str = "@Backup";

const RESOURCE_ROOTS: [&str; 2] = ["Resources", "Skins"];
const PLUGIN_ROOT: &str = "Plugins";
const LAYOUT_ROOT: &str = "Layouts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryCategory {
    Resource,
    Plugin,
    Layout,
    Unclassified,
}

impl EntryCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Plugin => "plugin",
            Self::Layout => "layout",
            Self::Unclassified => "unclassified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: EntryCategory,
    /// Destination path relative to the category's install root, `/`-separated.
    pub relative_path: String,
    /// Top-level resource directory; only set for [`EntryCategory::Resource`].
    pub resource_name: Option<String>,
}

impl Classification {
    fn unclassified() -> Self {
        Self {
            category: EntryCategory::Unclassified,
            relative_path: String::new(),
            resource_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    plugin_platform: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_PLUGIN_PLATFORM)
    }
}

impl Classifier {
    pub fn new(plugin_platform: impl Into<String>) -> Self {
        Self {
            plugin_platform: plugin_platform.into(),
        }
    }

    pub fn plugin_platform(&self) -> &str {
        &self.plugin_platform
    }

    pub fn classify(&self, path: &str) -> Classification {
        let normalized = classification_key(path);
        if normalized.is_empty() || normalized.ends_with('/') {
            return Classification::unclassified();
        }

        let segments: Vec<&str> = normalized.split('/').collect();
        if segments
            .iter()
            .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
        {
            return Classification::unclassified();
        }

        let root = segments[0];
        if RESOURCE_ROOTS
            .iter()
            .any(|candidate| root.eq_ignore_ascii_case(candidate))
        {
            // a resource needs at least <root>/<name>/<file>
            if segments.len() < 3 || segments[1].eq_ignore_ascii_case(BACKUP_DIR_NAME) {
                return Classification::unclassified();
            }
            return Classification {
                category: EntryCategory::Resource,
                relative_path: segments[1..].join("/"),
                resource_name: Some(segments[1].to_string()),
            };
        }

        if root.eq_ignore_ascii_case(PLUGIN_ROOT) {
            if segments.len() < 3 || !segments[1].eq_ignore_ascii_case(&self.plugin_platform) {
                return Classification::unclassified();
            }
            let Some(file_name) = segments.last() else {
                return Classification::unclassified();
            };
            return Classification {
                category: EntryCategory::Plugin,
                relative_path: (*file_name).to_string(),
                resource_name: None,
            };
        }

        if root.eq_ignore_ascii_case(LAYOUT_ROOT) && segments.len() >= 2 {
            return Classification {
                category: EntryCategory::Layout,
                relative_path: segments[1..].join("/"),
                resource_name: None,
            };
        }

        Classification::unclassified()
    }
}

/// Classifies `path` with the default plugin platform tag.
pub fn classify(path: &str) -> Classification {
    Classifier::default().classify(path)
}

/// Normalizes separators to `/` and drops a leading separator.
pub fn classification_key(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    normalized.trim_start_matches('/').to_string()
}

/// Compares two package-relative paths ignoring separator style and ASCII case.
pub fn same_relative_path(left: &str, right: &str) -> bool {
    classification_key(left.trim()).eq_ignore_ascii_case(&classification_key(right.trim()))
}
