//! Version Registry - Snapshots In Semantic Order
//!
//! Stable identifiers are strictly `vMAJOR.MINOR.PATCH`. The unstable
//! sentinel always sorts after every stable version.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::catalog::{collect_json_files, read_json};
use crate::error::{GenerationError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiVersion {
    Stable(semver::Version),
    /// The unstable sentinel, carrying its literal identifier
    Dev(String),
}

impl ApiVersion {
    /// Parse an identifier; `dev_tag` is the literal of the unstable sentinel.
    pub fn parse(identifier: &str, dev_tag: &str) -> Result<Self> {
        if identifier == dev_tag {
            return Ok(Self::Dev(identifier.to_string()));
        }

        let malformed = |reason: &str| GenerationError::MalformedVersion {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        };

        let digits = identifier
            .strip_prefix('v')
            .ok_or_else(|| malformed("does not start with a v"))?;

        let parts: Vec<&str> = digits.split('.').collect();
        if parts.len() != 3 {
            return Err(malformed("only vX.Y.Z is supported"));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed("components must be non-negative integers"));
            }
            *slot = part.parse().map_err(|_| malformed("component out of range"))?;
        }

        Ok(Self::Stable(semver::Version::new(numbers[0], numbers[1], numbers[2])))
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev(_))
    }

    pub fn stable(&self) -> Option<&semver::Version> {
        match self {
            Self::Stable(v) => Some(v),
            Self::Dev(_) => None,
        }
    }

    /// Suffix used in guard macro names: `1_2_0` or `DEV`
    pub fn guard_suffix(&self) -> String {
        match self {
            Self::Stable(v) => format!("{}_{}_{}", v.major, v.minor, v.patch),
            Self::Dev(_) => "DEV".to_string(),
        }
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Stable(a), Self::Stable(b)) => a.cmp(b),
            (Self::Stable(_), Self::Dev(_)) => Ordering::Less,
            (Self::Dev(_), Self::Stable(_)) => Ordering::Greater,
            (Self::Dev(a), Self::Dev(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable(v) => write!(f, "v{}.{}.{}", v.major, v.minor, v.patch),
            Self::Dev(tag) => f.write_str(tag),
        }
    }
}

/// A version snapshot record: `{version, entries}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub version: String,
    pub entries: Vec<String>,
}

/// Functions first exposed in the stable struct at `version`, in declared order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub version: ApiVersion,
    pub entries: Vec<String>,
}

impl VersionSnapshot {
    pub fn from_record(record: SnapshotRecord, dev_tag: &str) -> Result<Self> {
        Ok(Self {
            version: ApiVersion::parse(&record.version, dev_tag)?,
            entries: record.entries,
        })
    }
}

/// Order identifiers stable-ascending with the sentinel last.
pub fn order_versions(identifiers: &[&str], dev_tag: &str) -> Result<Vec<ApiVersion>> {
    let mut versions = identifiers
        .iter()
        .map(|id| ApiVersion::parse(id, dev_tag))
        .collect::<Result<Vec<_>>>()?;
    versions.sort();
    Ok(versions)
}

/// Snapshots in total semantic order
#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    snapshots: Vec<VersionSnapshot>,
}

impl VersionRegistry {
    pub fn from_snapshots(mut snapshots: Vec<VersionSnapshot>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for snapshot in &snapshots {
            if !seen.insert(&snapshot.version) {
                return Err(GenerationError::DuplicateVersion(snapshot.version.to_string()));
            }
        }
        snapshots.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(Self { snapshots })
    }

    /// Load one snapshot per `*.json` file under `dir`, skipping `exclusion_file`.
    ///
    /// Each file's stem must equal the version it declares.
    pub fn load_from_dir(dir: &Path, exclusion_file: &Path, dev_tag: &str) -> Result<Self> {
        let excluded = exclusion_file
            .canonicalize()
            .unwrap_or_else(|_| exclusion_file.to_path_buf());
        let mut snapshots = vec![];
        for path in collect_json_files(dir)? {
            if path == exclusion_file || path.canonicalize().is_ok_and(|p| p == excluded) {
                continue;
            }
            let record: SnapshotRecord = read_json(&path)?;
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            if stem != record.version {
                return Err(GenerationError::VersionFileMismatch {
                    path,
                    declared: record.version,
                });
            }
            snapshots.push(VersionSnapshot::from_record(record, dev_tag)?);
        }

        let registry = Self::from_snapshots(snapshots)?;
        let order: Vec<String> = registry.versions().map(ToString::to_string).collect();
        debug!(versions = ?order, "version snapshots ordered");
        Ok(registry)
    }

    pub fn snapshots(&self) -> &[VersionSnapshot] {
        &self.snapshots
    }

    pub fn versions(&self) -> impl Iterator<Item = &ApiVersion> {
        self.snapshots.iter().map(|s| &s.version)
    }

    /// The newest stable version: what plugins get when they ask for nothing.
    pub fn current_version(&self) -> Result<&ApiVersion> {
        self.versions()
            .filter(|v| !v.is_dev())
            .last()
            .ok_or(GenerationError::NoStableVersion)
    }

    /// Total number of entries across all snapshots
    pub fn entry_count(&self) -> usize {
        self.snapshots.iter().map(|s| s.entries.len()).sum()
    }
}
