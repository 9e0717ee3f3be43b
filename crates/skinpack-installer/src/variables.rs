use std::path::Path;

use skinpack_core::{SectionStore, SectionStoreError};

pub const VARIABLES_SECTION: &str = "Variables";

/// Copies every key of the backed-up file's `Variables` section into the
/// freshly installed file. Keys only the new file has are left alone.
/// Returns the number of keys written.
pub fn restore_variables(backup_file: &Path, installed_file: &Path) -> Result<usize, SectionStoreError> {
    let backup = SectionStore::open(backup_file)?;
    let variables = match backup.read_section_raw(VARIABLES_SECTION) {
        Ok(variables) => variables,
        Err(SectionStoreError::NotFound { .. }) => return Ok(0),
        Err(err) => return Err(err),
    };

    let mut installed = SectionStore::open(installed_file)?;
    for (key, value) in &variables {
        installed.write(VARIABLES_SECTION, key, Some(value));
    }
    installed.save()?;
    tracing::debug!(
        file = %installed_file.display(),
        keys = variables.len(),
        "restored variables"
    );
    Ok(variables.len())
}
