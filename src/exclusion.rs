//! Exclusion Registry
//!
//! Functions deliberately kept out of the stable struct.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::catalog::{read_json, Catalog};
use crate::error::{GenerationError, Result};

/// `{exclusion_list: [{entries: [...]}]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub exclusion_list: Vec<ExclusionGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionGroup {
    #[serde(default)]
    pub group: Option<String>,
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
}

impl ExclusionSet {
    /// Flatten a record, rejecting any name the catalog does not define.
    pub fn from_record(record: ExclusionRecord, catalog: &Catalog) -> Result<Self> {
        let mut names = BTreeSet::new();
        for group in record.exclusion_list {
            for entry in group.entries {
                if !catalog.contains(&entry) {
                    return Err(GenerationError::UnknownExclusionEntry { name: entry });
                }
                names.insert(entry);
            }
        }
        Ok(Self { names })
    }

    pub fn load(path: &Path, catalog: &Catalog) -> Result<Self> {
        let record: ExclusionRecord = read_json(path)?;
        Self::from_record(record, catalog)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
