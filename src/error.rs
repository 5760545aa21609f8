//! Error types for header generation

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::AuditReport;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Duplicate symbol {name}: defined in {first} and again in {second}")]
    DuplicateSymbol {
        name: String,
        first: String,
        second: String,
    },

    #[error("Malformed version '{identifier}': {reason}")]
    MalformedVersion { identifier: String, reason: String },

    #[error("Mismatch between file name and version in {path}: file declares '{declared}'")]
    VersionFileMismatch { path: PathBuf, declared: String },

    #[error("Version {0} is declared by more than one snapshot file")]
    DuplicateVersion(String),

    #[error("No stable version snapshot found; at least one vX.Y.Z snapshot is required")]
    NoStableVersion,

    #[error("Invalid item found in exclusion list: {name}. This entry does not occur in the API")]
    UnknownExclusionEntry { name: String },

    /// Every `(version, name)` pair naming a function the catalog lacks
    #[error("Version snapshots list functions that do not occur in the API: {}", list_entries(.entries))]
    UnknownSnapshotEntries { entries: Vec<(String, String)> },

    #[error("Function group '{0}' is listed in the group order but was not found in the catalog")]
    UnknownGroup(String),

    #[error("Uncommented parameter found: {param} of function {function}")]
    MissingParamComment { function: String, param: String },

    #[error("{0}")]
    Consistency(AuditReport),

    #[error("Layout regression at block {index} ({version}): {reason}")]
    LayoutRegression {
        index: usize,
        version: String,
        reason: String,
    },

    #[error("Header template {path} is missing the mark '{mark}'")]
    TemplateMark { path: PathBuf, mark: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON found in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GenerationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json { path: path.into(), source }
    }

    /// Batch audit failures as opposed to structural failures raised at detection time.
    pub fn is_audit_failure(&self) -> bool {
        matches!(self, Self::Consistency(_) | Self::LayoutRegression { .. })
    }
}

fn list_entries(entries: &[(String, String)]) -> String {
    entries
        .iter()
        .map(|(version, name)| format!("{name} ({version})"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<figment::Error> for GenerationError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
