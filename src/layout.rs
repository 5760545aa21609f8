//! Struct Assembler - Append-Only Field Layout
//!
//! Blocks follow version order; fields inside a block keep the snapshot's
//! declared order. Nothing is sorted, deduplicated or regrouped: the field
//! order is the ABI.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use crate::catalog::read_json;
use crate::error::{GenerationError, Result};
use crate::hashing::compute_block_fingerprint;
use crate::versions::{ApiVersion, VersionRegistry};

/// The fields first exposed at one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub version: ApiVersion,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructLayout {
    blocks: Vec<LayoutBlock>,
    /// Every emitted name and each version that emitted it
    emitted: BTreeMap<String, Vec<ApiVersion>>,
}

impl StructLayout {
    /// Build the layout from already ordered snapshots.
    pub fn assemble(registry: &VersionRegistry) -> Self {
        let mut layout = Self::default();
        for snapshot in registry.snapshots() {
            for name in &snapshot.entries {
                layout
                    .emitted
                    .entry(name.clone())
                    .or_default()
                    .push(snapshot.version.clone());
            }
            layout.blocks.push(LayoutBlock {
                version: snapshot.version.clone(),
                fields: snapshot.entries.clone(),
            });
        }
        debug!(
            blocks = layout.blocks.len(),
            fields = layout.field_count(),
            "struct layout assembled"
        );
        layout
    }

    pub fn blocks(&self) -> &[LayoutBlock] {
        &self.blocks
    }

    /// Cumulative set of emitted names
    pub fn emitted_names(&self) -> BTreeSet<&str> {
        self.emitted.keys().map(String::as_str).collect()
    }

    /// Versions that emitted `name`, in layout order
    pub fn emitted_by(&self, name: &str) -> &[ApiVersion] {
        self.emitted.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field_count(&self) -> usize {
        self.blocks.iter().map(|b| b.fields.len()).sum()
    }

    /// Fields visible to a consumer with the given guard macros enabled.
    pub fn visible_fields<'a>(&'a self, enabled: &[&ApiVersion]) -> Vec<&'a str> {
        self.blocks
            .iter()
            .filter(|b| enabled.contains(&&b.version))
            .flat_map(|b| b.fields.iter().map(String::as_str))
            .collect()
    }

    pub fn guard_ladder(&self) -> GuardLadder {
        GuardLadder {
            stable: self
                .blocks
                .iter()
                .filter(|b| !b.version.is_dev())
                .map(|b| b.version.clone())
                .collect(),
            dev: self
                .blocks
                .iter()
                .find(|b| b.version.is_dev())
                .map(|b| b.version.clone()),
        }
    }

    pub fn lock(&self) -> Result<LayoutLock> {
        let blocks = self
            .blocks
            .iter()
            .map(|b| {
                let version = b.version.to_string();
                let fingerprint = compute_block_fingerprint(&version, &b.fields)?;
                Ok(LockedBlock {
                    version,
                    dev: b.version.is_dev(),
                    fields: b.fields.clone(),
                    fingerprint,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LayoutLock { blocks })
    }
}

/// "Version N implies version N-1" for every adjacent pair of stable
/// versions. The unstable guard stands alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardLadder {
    stable: Vec<ApiVersion>,
    dev: Option<ApiVersion>,
}

/// Enabling `newer` also enables `older`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRung<'a> {
    pub newer: &'a ApiVersion,
    pub older: &'a ApiVersion,
}

impl GuardLadder {
    /// Rungs newest first, the order they must appear in for one
    /// preprocessor pass to cascade.
    pub fn rungs(&self) -> Vec<GuardRung<'_>> {
        self.stable
            .windows(2)
            .rev()
            .map(|pair| GuardRung {
                newer: &pair[1],
                older: &pair[0],
            })
            .collect()
    }

    /// Stable versions, ascending
    pub fn stable(&self) -> &[ApiVersion] {
        &self.stable
    }

    pub fn dev(&self) -> Option<&ApiVersion> {
        self.dev.as_ref()
    }

    pub fn latest(&self) -> Option<&ApiVersion> {
        self.stable.last()
    }

    /// Every guard enabled once `selected` is, evaluated rung by rung.
    pub fn enabled_by<'a>(&'a self, selected: &'a ApiVersion) -> Vec<&'a ApiVersion> {
        let mut enabled = vec![selected];
        for rung in self.rungs() {
            if enabled.contains(&rung.newer) && !enabled.contains(&rung.older) {
                enabled.push(rung.older);
            }
        }
        enabled
    }

    /// The guard a numeric version request enters the ladder at: the
    /// newest stable snapshot not newer than `requested`.
    pub fn entry_for(&self, requested: &semver::Version) -> Option<&ApiVersion> {
        self.stable
            .iter()
            .rev()
            .find(|v| v.stable().map_or(false, |s| s <= requested))
    }

    /// Exclusive upper bound for `version`'s entry rung
    pub fn next_after(&self, version: &ApiVersion) -> Option<&ApiVersion> {
        let index = self.stable.iter().position(|v| v == version)?;
        self.stable.get(index + 1)
    }
}

/// Persisted layout used to enforce append-only regeneration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutLock {
    pub blocks: Vec<LockedBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedBlock {
    pub version: String,
    #[serde(default)]
    pub dev: bool,
    pub fields: Vec<String>,
    pub fingerprint: String,
}

impl LayoutLock {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Every previously shipped stable block must reappear unchanged at the
    /// same position. The unstable block may change freely.
    pub fn check_append_only(&self, current: &LayoutLock) -> Result<()> {
        for (index, previous) in self.blocks.iter().enumerate().filter(|(_, b)| !b.dev) {
            let regression = |reason: String| GenerationError::LayoutRegression {
                index,
                version: previous.version.clone(),
                reason,
            };

            let block = current
                .blocks
                .get(index)
                .ok_or_else(|| regression("block no longer exists".to_string()))?;

            if block.version != previous.version {
                return Err(regression(format!("position now holds {}", block.version)));
            }
            if block.fingerprint == previous.fingerprint {
                continue;
            }

            let reason = match block
                .fields
                .iter()
                .zip(&previous.fields)
                .position(|(now, was)| now != was)
            {
                Some(at) => format!(
                    "field {} changed from {} to {}",
                    at, previous.fields[at], block.fields[at]
                ),
                None => format!(
                    "field count changed from {} to {}",
                    previous.fields.len(),
                    block.fields.len()
                ),
            };
            return Err(regression(reason));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::VersionSnapshot;

    fn v(id: &str) -> ApiVersion {
        ApiVersion::parse(id, "dev").unwrap()
    }

    fn registry(snapshots: &[(&str, &[&str])]) -> VersionRegistry {
        VersionRegistry::from_snapshots(
            snapshots
                .iter()
                .map(|(version, entries)| VersionSnapshot {
                    version: v(version),
                    entries: entries.iter().map(|e| e.to_string()).collect(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_blocks_follow_version_order_fields_keep_declared_order() {
        let layout = StructLayout::assemble(&registry(&[
            ("v1.0.0", &["zeta", "alpha"]),
            ("dev", &["unstable_fn"]),
            ("v0.9.0", &["open", "close"]),
        ]));
        let versions: Vec<_> = layout.blocks().iter().map(|b| b.version.to_string()).collect();
        assert_eq!(versions, vec!["v0.9.0", "v1.0.0", "dev"]);
        assert_eq!(layout.blocks()[1].fields, vec!["zeta", "alpha"]);
        assert_eq!(layout.field_count(), 5);
        assert!(layout.emitted_names().contains("unstable_fn"));
    }

    #[test]
    fn test_emitted_by_tracks_redeclaration() {
        let layout = StructLayout::assemble(&registry(&[("v0.1.0", &["a"]), ("v0.2.0", &["a", "b"])]));
        assert_eq!(layout.emitted_by("a"), &[v("v0.1.0"), v("v0.2.0")]);
        assert_eq!(layout.emitted_by("b").len(), 1);
        assert!(layout.emitted_by("missing").is_empty());
    }

    #[test]
    fn test_ladder_implication() {
        let layout = StructLayout::assemble(&registry(&[
            ("v1.0.0", &["b"]),
            ("v1.2.0", &["c"]),
            ("v0.9.0", &["a"]),
            ("dev", &["d"]),
        ]));
        let ladder = layout.guard_ladder();

        let rungs: Vec<_> = ladder
            .rungs()
            .iter()
            .map(|r| format!("{}->{}", r.newer, r.older))
            .collect();
        assert_eq!(rungs, vec!["v1.2.0->v1.0.0", "v1.0.0->v0.9.0"]);

        let selected = v("v1.2.0");
        let enabled = ladder.enabled_by(&selected);
        assert_eq!(layout.visible_fields(&enabled), vec!["a", "b", "c"]);

        let selected = v("v1.0.0");
        let enabled = ladder.enabled_by(&selected);
        assert_eq!(layout.visible_fields(&enabled), vec!["a", "b"]);
    }

    #[test]
    fn test_dev_guard_is_independent() {
        let layout = StructLayout::assemble(&registry(&[("v1.0.0", &["a"]), ("v0.9.0", &["b"]), ("dev", &["d"])]));
        let ladder = layout.guard_ladder();
        let dev = v("dev");

        assert_eq!(ladder.dev(), Some(&dev));
        assert!(ladder.rungs().iter().all(|r| !r.newer.is_dev() && !r.older.is_dev()));
        assert_eq!(ladder.enabled_by(&dev), vec![&dev]);

        let latest = v("v1.0.0");
        assert!(!ladder.enabled_by(&latest).contains(&&dev));
    }

    #[test]
    fn test_entry_for_numeric_request() {
        let layout = StructLayout::assemble(&registry(&[("v0.9.0", &[]), ("v1.0.0", &[]), ("v1.2.0", &[])]));
        let ladder = layout.guard_ladder();
        let entry = |s: &str| ladder.entry_for(&semver::Version::parse(s).unwrap()).map(ToString::to_string);

        assert_eq!(entry("1.1.5").as_deref(), Some("v1.0.0"));
        assert_eq!(entry("1.2.0").as_deref(), Some("v1.2.0"));
        assert_eq!(entry("3.0.0").as_deref(), Some("v1.2.0"));
        assert_eq!(entry("0.1.0"), None);
        assert_eq!(ladder.next_after(&v("v1.0.0")), Some(&v("v1.2.0")));
        assert_eq!(ladder.next_after(&v("v1.2.0")), None);
    }

    #[test]
    fn test_append_only_accepts_appended_block() {
        let before = StructLayout::assemble(&registry(&[("v0.9.0", &["a"]), ("dev", &["x"])]));
        let after = StructLayout::assemble(&registry(&[("v0.9.0", &["a"]), ("v1.0.0", &["x"]), ("dev", &["y"])]));
        before.lock().unwrap().check_append_only(&after.lock().unwrap()).unwrap();
    }

    #[test]
    fn test_append_only_rejects_reordered_fields() {
        let before = StructLayout::assemble(&registry(&[("v0.9.0", &["a", "b"])]));
        let after = StructLayout::assemble(&registry(&[("v0.9.0", &["b", "a"])]));
        let err = before.lock().unwrap().check_append_only(&after.lock().unwrap()).unwrap_err();
        match err {
            GenerationError::LayoutRegression { index, version, reason } => {
                assert_eq!(index, 0);
                assert_eq!(version, "v0.9.0");
                assert!(reason.contains("field 0 changed from a to b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_append_only_rejects_inserted_older_version() {
        let before = StructLayout::assemble(&registry(&[("v0.9.0", &["a"]), ("v1.0.0", &["b"])]));
        let after = StructLayout::assemble(&registry(&[("v0.9.0", &["a"]), ("v0.9.5", &["c"]), ("v1.0.0", &["b"])]));
        let err = before.lock().unwrap().check_append_only(&after.lock().unwrap()).unwrap_err();
        assert!(err.to_string().contains("position now holds v0.9.5"));
    }

    #[test]
    fn test_lock_round_trips_through_json() {
        let layout = StructLayout::assemble(&registry(&[("v0.9.0", &["a"])]));
        let lock = layout.lock().unwrap();
        let parsed: LayoutLock = serde_json::from_str(&lock.to_json().unwrap()).unwrap();
        assert_eq!(parsed, lock);
    }
}
