use skinpack_core::{Classification, Classifier, EntryCategory};

use crate::PackageEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub entry: PackageEntry,
    pub classification: Classification,
}

/// Classified view of a package: the entries an install will place, in
/// archive order, and the resource names it will back up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    pub entries: Vec<PlannedEntry>,
    pub resource_names: Vec<String>,
    pub skipped: Vec<String>,
}

impl InstallPlan {
    pub fn build(entries: &[PackageEntry], classifier: &Classifier) -> Self {
        let mut plan = Self::default();
        for entry in entries {
            let classification = classifier.classify(&entry.name);
            if entry.is_dir || classification.category == EntryCategory::Unclassified {
                plan.skipped.push(entry.name.clone());
                continue;
            }
            if let Some(name) = &classification.resource_name {
                if !plan
                    .resource_names
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(name))
                {
                    plan.resource_names.push(name.clone());
                }
            }
            plan.entries.push(PlannedEntry {
                entry: entry.clone(),
                classification,
            });
        }
        plan
    }

    pub fn count(&self, category: EntryCategory) -> usize {
        self.entries
            .iter()
            .filter(|planned| planned.classification.category == category)
            .count()
    }
}
