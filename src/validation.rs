//! Consistency Validator - Rule/Report Separation
//!
//! Rules produce structured violations. Every rule runs to completion so a
//! single run reports every offending name at once.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::Catalog;
use crate::exclusion::ExclusionSet;
use crate::layout::StructLayout;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Defined in the catalog, but in neither a snapshot nor the exclusion list
    Coverage,
    /// In a snapshot and in the exclusion list
    Conflict,
    /// In more than one snapshot
    Redeclaration,
}

impl ViolationKind {
    fn heading(&self) -> &'static str {
        match self {
            Self::Coverage => {
                "Coverage: functions defined in the C API but added to neither the API struct nor the exclusion list"
            }
            Self::Conflict => "Conflict: functions in both the API struct and the exclusion list",
            Self::Redeclaration => "Redeclaration: functions added to the API struct by more than one version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    pub rule: String,
    pub kind: ViolationKind,
    pub symbol: String,
    pub message: String,
    pub remediation: Vec<String>,
}

/// Everything the rules look at
pub struct AuditInput<'a> {
    pub catalog: &'a Catalog,
    pub layout: &'a StructLayout,
    pub exclusions: &'a ExclusionSet,
}

/// Audit rule trait - produces violations
pub trait AuditRule {
    fn name(&self) -> &'static str;
    fn audit(&self, input: &AuditInput<'_>) -> Vec<Violation>;
}

// --- Concrete Rules ---

pub struct CoverageRule;

impl AuditRule for CoverageRule {
    fn name(&self) -> &'static str { "coverage" }

    fn audit(&self, input: &AuditInput<'_>) -> Vec<Violation> {
        let emitted = input.layout.emitted_names();
        input
            .catalog
            .names()
            .filter(|name| !emitted.contains(name) && !input.exclusions.contains(name))
            .map(|name| Violation {
                rule: self.name().to_string(),
                kind: ViolationKind::Coverage,
                symbol: name.to_string(),
                message: format!("{} is not accounted for", name),
                remediation: vec![
                    "Add it to the entries of a version snapshot".to_string(),
                    "Or add it to the exclusion list".to_string(),
                ],
            })
            .collect()
    }
}

pub struct ConflictRule;

impl AuditRule for ConflictRule {
    fn name(&self) -> &'static str { "conflict" }

    fn audit(&self, input: &AuditInput<'_>) -> Vec<Violation> {
        input
            .layout
            .emitted_names()
            .into_iter()
            .filter(|name| input.exclusions.contains(name))
            .map(|name| Violation {
                rule: self.name().to_string(),
                kind: ViolationKind::Conflict,
                symbol: name.to_string(),
                message: format!("{} is both in the API struct and excluded from it", name),
                remediation: vec!["Remove it from either the version snapshot or the exclusion list".to_string()],
            })
            .collect()
    }
}

pub struct RedeclarationRule;

impl AuditRule for RedeclarationRule {
    fn name(&self) -> &'static str { "redeclaration" }

    fn audit(&self, input: &AuditInput<'_>) -> Vec<Violation> {
        input
            .layout
            .emitted_names()
            .into_iter()
            .filter_map(|name| {
                let versions = input.layout.emitted_by(name);
                if versions.len() < 2 {
                    return None;
                }
                let listed: Vec<_> = versions.iter().map(ToString::to_string).collect();
                Some(Violation {
                    rule: self.name().to_string(),
                    kind: ViolationKind::Redeclaration,
                    symbol: name.to_string(),
                    message: format!("{} is declared by {}", name, listed.join(", ")),
                    remediation: vec!["Keep it only in the version that first exposed it".to_string()],
                })
            })
            .collect()
    }
}

/// The batch outcome of one audit
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditReport {
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    /// Offending names of one class
    pub fn symbols(&self, kind: ViolationKind) -> Vec<&str> {
        self.of_kind(kind).map(|v| v.symbol.as_str()).collect()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Catalog audit failed with {} violation(s)", self.violations.len())?;
        for kind in [ViolationKind::Coverage, ViolationKind::Conflict, ViolationKind::Redeclaration] {
            let symbols = self.symbols(kind);
            if symbols.is_empty() {
                continue;
            }
            write!(f, "\n * {}:", kind.heading())?;
            for symbol in symbols {
                write!(f, "\n   - {}", symbol)?;
            }
        }
        Ok(())
    }
}

/// Auditor orchestrates rules
pub struct Auditor {
    rules: Vec<Box<dyn AuditRule>>,
}

impl Auditor {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(CoverageRule),
                Box::new(ConflictRule),
                Box::new(RedeclarationRule),
            ],
        }
    }

    pub fn audit(&self, input: &AuditInput<'_>) -> AuditReport {
        let mut violations = vec![];
        for rule in &self.rules {
            violations.extend(rule.audit(input));
        }
        AuditReport { violations }
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FunctionDefinition, FunctionGroup};
    use crate::versions::{ApiVersion, VersionRegistry, VersionSnapshot};

    fn catalog(names: &[&str]) -> Catalog {
        let mut catalog = Catalog::new();
        let entries = names
            .iter()
            .map(|n| FunctionDefinition {
                name: n.to_string(),
                return_type: "void".to_string(),
                params: vec![],
                group: String::new(),
                deprecated: false,
                comment: None,
            })
            .collect();
        catalog
            .register_group(
                FunctionGroup { group: "g".to_string(), description: None, deprecated: false, entries },
                "g.json",
            )
            .unwrap();
        catalog
    }

    fn layout(snapshots: &[(&str, &[&str])]) -> StructLayout {
        let registry = VersionRegistry::from_snapshots(
            snapshots
                .iter()
                .map(|(v, entries)| VersionSnapshot {
                    version: ApiVersion::parse(v, "dev").unwrap(),
                    entries: entries.iter().map(|e| e.to_string()).collect(),
                })
                .collect(),
        )
        .unwrap();
        StructLayout::assemble(&registry)
    }

    fn audit(catalog: &Catalog, layout: &StructLayout, exclusions: &ExclusionSet) -> AuditReport {
        Auditor::new().audit(&AuditInput { catalog, layout, exclusions })
    }

    #[test]
    fn test_clean_audit() {
        let catalog = catalog(&["a", "b", "c"]);
        let layout = layout(&[("v1.0.0", &["a"]), ("dev", &["b"])]);
        let exclusions: ExclusionSet = ["c"].into_iter().collect();
        assert!(audit(&catalog, &layout, &exclusions).is_clean());
    }

    #[test]
    fn test_coverage_and_conflict_reported_together() {
        let catalog = catalog(&["a", "b", "c", "d"]);
        let layout = layout(&[("v1.0.0", &["a", "b"])]);
        let exclusions: ExclusionSet = ["b"].into_iter().collect();

        let report = audit(&catalog, &layout, &exclusions);
        assert_eq!(report.symbols(ViolationKind::Coverage), vec!["c", "d"]);
        assert_eq!(report.symbols(ViolationKind::Conflict), vec!["b"]);
        assert_eq!(report.violations.len(), 3);
    }

    #[test]
    fn test_conflict_reported_once_per_name() {
        let catalog = catalog(&["a"]);
        let layout = layout(&[("v0.1.0", &["a"]), ("v0.2.0", &["a"])]);
        let exclusions: ExclusionSet = ["a"].into_iter().collect();

        let report = audit(&catalog, &layout, &exclusions);
        assert_eq!(report.symbols(ViolationKind::Conflict), vec!["a"]);
        assert_eq!(report.symbols(ViolationKind::Redeclaration), vec!["a"]);
    }

    #[test]
    fn test_report_lists_every_name() {
        let catalog = catalog(&["a", "b", "c"]);
        let layout = layout(&[("v1.0.0", &["a"])]);
        let exclusions: ExclusionSet = ["a"].into_iter().collect();

        let text = audit(&catalog, &layout, &exclusions).to_string();
        assert!(text.starts_with("Catalog audit failed with 3 violation(s)"));
        assert!(text.contains("   - b\n   - c"));
        assert!(text.contains("Conflict:"));
        assert!(!text.contains("Redeclaration:"));
    }
}
