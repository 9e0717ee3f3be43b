mod classify;
mod metadata;
mod report;
mod section_store;
mod version;

pub use classify::{
    classification_key, classify, same_relative_path, Classification, Classifier, EntryCategory,
    BACKUP_DIR_NAME, DEFAULT_PLUGIN_PLATFORM,
};
pub use metadata::{
    parse_variable_files, Activation, ActivationKind, MetadataError, PackageMetadata,
    METADATA_ENTRY, METADATA_SECTION,
};
pub use report::{NullReporter, RecordingReporter, ReportLevel, Reporter};
pub use section_store::{parse_section_buffer, SectionStore, SectionStoreError, TextEncoding};
pub use version::{is_newer, VersionDescriptor, VersionParseError, VersionReadError};
