//! Function Catalog - Every Callable Function, Once
//!
//! Function group records are loaded from a directory tree. Each record
//! owns its functions; a function's group is the record it came from.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{GenerationError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionComment {
    pub description: String,
    #[serde(default)]
    pub param_comments: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub return_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: String,
    pub return_type: String,
    #[serde(default)]
    pub params: Vec<Param>,
    /// Filled in from the owning group record
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub comment: Option<FunctionComment>,
}

/// A function group record: `{group, description?, deprecated?, entries}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionGroup {
    pub group: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    pub entries: Vec<FunctionDefinition>,
}

/// Name -> definition map plus the groups in display order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    functions: BTreeMap<String, FunctionDefinition>,
    origins: BTreeMap<String, String>,
    groups: Vec<FunctionGroup>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` group record under `dir`, in path order.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut catalog = Self::new();
        for path in collect_json_files(dir)? {
            let group: FunctionGroup = read_json(&path)?;
            catalog.register_group(group, &path.display().to_string())?;
        }
        debug!(
            functions = catalog.len(),
            groups = catalog.groups.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Add a group record. `origin` names the record in diagnostics.
    ///
    /// Fails with `DuplicateSymbol` before anything from the record is kept.
    pub fn register_group(&mut self, mut group: FunctionGroup, origin: &str) -> Result<()> {
        let mut in_record = BTreeSet::new();
        for function in &mut group.entries {
            if let Some(first) = self.origins.get(&function.name) {
                return Err(GenerationError::DuplicateSymbol {
                    name: function.name.clone(),
                    first: first.clone(),
                    second: origin.to_string(),
                });
            }
            if !in_record.insert(function.name.clone()) {
                return Err(GenerationError::DuplicateSymbol {
                    name: function.name.clone(),
                    first: origin.to_string(),
                    second: origin.to_string(),
                });
            }
            function.group = group.group.clone();
        }

        for function in &group.entries {
            self.origins.insert(function.name.clone(), origin.to_string());
            self.functions.insert(function.name.clone(), function.clone());
        }
        self.groups.push(group);
        Ok(())
    }

    /// Put the groups into the curated display order.
    ///
    /// Groups missing from `order` are appended alphabetically.
    pub fn apply_group_order(&mut self, order: &[String]) -> Result<()> {
        let mut remaining = std::mem::take(&mut self.groups);
        let mut ordered = Vec::with_capacity(remaining.len());

        for name in order {
            let index = remaining
                .iter()
                .position(|g| &g.group == name)
                .ok_or_else(|| GenerationError::UnknownGroup(name.clone()))?;
            ordered.push(remaining.remove(index));
        }

        if !remaining.is_empty() {
            remaining.sort_by(|a, b| a.group.cmp(&b.group));
            let names: Vec<_> = remaining.iter().map(|g| g.group.as_str()).collect();
            warn!(groups = ?names, "function groups missing from group_order; appending alphabetically");
            ordered.extend(remaining);
        }

        self.groups = ordered;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// All function names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn groups(&self) -> &[FunctionGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Recursively collect `*.json` files, sorted by path.
///
/// Symlinks are not followed, so a linked directory cannot load a record twice.
pub(crate) fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            GenerationError::io(path, e.into())
        })?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|x| x == "json") {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| GenerationError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| GenerationError::json(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group(name: &str, functions: &[&str]) -> FunctionGroup {
        FunctionGroup {
            group: name.to_string(),
            description: None,
            deprecated: false,
            entries: functions
                .iter()
                .map(|f| FunctionDefinition {
                    name: f.to_string(),
                    return_type: "void".to_string(),
                    params: vec![],
                    group: String::new(),
                    deprecated: false,
                    comment: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_group_record() {
        let record = json!({
            "group": "open_connect",
            "deprecated": true,
            "entries": [{
                "name": "duckdb_open",
                "return_type": "duckdb_state",
                "params": [{"type": "const char *", "name": "path"}],
                "comment": {
                    "description": "Opens a database.\n",
                    "param_comments": {"path": "Path to the database file."},
                    "return_value": "`DuckDBSuccess` on success."
                }
            }]
        });
        let group: FunctionGroup = serde_json::from_value(record).unwrap();
        assert!(group.deprecated);
        assert_eq!(group.entries[0].params[0].ty, "const char *");
        assert!(!group.entries[0].deprecated);
        let comment = group.entries[0].comment.as_ref().unwrap();
        assert_eq!(comment.param_comments.as_ref().unwrap()["path"], "Path to the database file.");
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let record = json!({"group": "g", "entries": [{"name": "f"}]});
        let err = serde_json::from_value::<FunctionGroup>(record).unwrap_err();
        assert!(err.to_string().contains("return_type"));
    }

    #[test]
    fn test_register_sets_group_membership() {
        let mut catalog = Catalog::new();
        catalog.register_group(group("helpers", &["a", "b"]), "helpers.json").unwrap();
        assert_eq!(catalog.get("a").unwrap().group, "helpers");
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_duplicate_symbol_across_records() {
        let mut catalog = Catalog::new();
        catalog.register_group(group("one", &["a"]), "one.json").unwrap();
        let err = catalog.register_group(group("two", &["b", "a"]), "two.json").unwrap_err();
        match err {
            GenerationError::DuplicateSymbol { name, first, second } => {
                assert_eq!(name, "a");
                assert_eq!(first, "one.json");
                assert_eq!(second, "two.json");
            }
            other => panic!("unexpected error: {other}"),
        }
        // the failed record left nothing behind
        assert!(!catalog.contains("b"));
    }

    #[test]
    fn test_duplicate_symbol_within_record() {
        let mut catalog = Catalog::new();
        let err = catalog.register_group(group("one", &["a", "a"]), "one.json").unwrap_err();
        assert!(matches!(err, GenerationError::DuplicateSymbol { .. }));
    }

    #[test]
    fn test_group_order_with_alphabetical_fallback() {
        let mut catalog = Catalog::new();
        catalog.register_group(group("zeta", &["z"]), "z.json").unwrap();
        catalog.register_group(group("alpha", &["a"]), "a.json").unwrap();
        catalog.register_group(group("main", &["m"]), "m.json").unwrap();

        catalog.apply_group_order(&["main".to_string()]).unwrap();
        let order: Vec<_> = catalog.groups().iter().map(|g| g.group.as_str()).collect();
        assert_eq!(order, vec!["main", "alpha", "zeta"]);
    }

    #[test]
    fn test_group_order_unknown_group() {
        let mut catalog = Catalog::new();
        catalog.register_group(group("main", &["m"]), "m.json").unwrap();
        let err = catalog
            .apply_group_order(&["main".to_string(), "ghost".to_string()])
            .unwrap_err();
        assert!(matches!(err, GenerationError::UnknownGroup(g) if g == "ghost"));
    }

    #[test]
    fn test_load_from_dir_is_path_ordered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested/b.json"),
            json!({"group": "b", "entries": [{"name": "fb", "return_type": "void"}]}).to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("a.json"),
            json!({"group": "a", "entries": [{"name": "fa", "return_type": "void"}]}).to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = Catalog::load_from_dir(dir.path()).unwrap();
        let order: Vec<_> = catalog.groups().iter().map(|g| g.group.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_load_from_dir_skips_symlinked_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(
            dir.path().join("sub/g.json"),
            json!({"group": "g", "entries": [{"name": "f_a", "return_type": "void"}]}).to_string(),
        )
        .unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("alias")).unwrap();

        let catalog = Catalog::load_from_dir(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.groups().len(), 1);
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let err = Catalog::load_from_dir(&missing).unwrap_err();
        assert!(matches!(err, GenerationError::Io { path, .. } if path == missing));
    }

    #[test]
    fn test_invalid_json_names_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        let err = Catalog::load_from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
