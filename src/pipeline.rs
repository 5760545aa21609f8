//! Generation Pipeline - Single Entry Point
//!
//! load -> order -> assemble -> audit -> emit. Structural errors abort at
//! detection; the coverage/conflict audit runs to completion and aborts
//! once with every violation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::GeneratorConfig;
use crate::emit::{builtin_template, extension_header, internal_header, public_header, EmitContext};
use crate::error::{GenerationError, Result};
use crate::exclusion::ExclusionSet;
use crate::hashing::compute_artifact_fingerprint;
use crate::layout::{LayoutLock, StructLayout};
use crate::validation::{AuditInput, Auditor};
use crate::versions::VersionRegistry;

/// Everything loaded from disk before generation starts
#[derive(Debug, Clone)]
pub struct GenerationInputs {
    pub catalog: Catalog,
    pub registry: VersionRegistry,
    pub exclusions: ExclusionSet,
    pub template: String,
    pub template_source: PathBuf,
    /// Layout persisted by the previous run, if any
    pub previous_lock: Option<LayoutLock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: String,
    pub fingerprint: String,
}

impl Artifact {
    fn new(path: &Path, contents: String) -> Self {
        Self {
            path: path.to_path_buf(),
            fingerprint: compute_artifact_fingerprint(&contents),
            contents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub current_version: String,
    pub versions: Vec<String>,
    pub total_functions: usize,
    pub struct_functions: usize,
    pub excluded_functions: usize,
    pub artifacts: Vec<ArtifactSummary>,
}

/// The result of one successful run
#[derive(Debug, Clone)]
pub struct Generation {
    pub layout: StructLayout,
    pub artifacts: Vec<Artifact>,
    pub summary: GenerationSummary,
}

/// The generation pipeline
pub struct Generator {
    config: GeneratorConfig,
    auditor: Auditor,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            auditor: Auditor::new(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Read every input record named by the configuration.
    pub fn load_inputs(&self) -> Result<GenerationInputs> {
        let config = &self.config;
        config.validate().map_err(GenerationError::Config)?;

        let mut catalog = Catalog::load_from_dir(&config.functions_dir)?;
        catalog.apply_group_order(&config.group_order)?;

        let registry = VersionRegistry::load_from_dir(&config.api_dir, &config.exclusion_file, &config.dev_tag)?;
        let exclusions = ExclusionSet::load(&config.exclusion_file, &catalog)?;

        let (template, template_source) = match &config.header_template {
            Some(path) => (
                fs::read_to_string(path).map_err(|e| GenerationError::io(path, e))?,
                path.clone(),
            ),
            None => (builtin_template(config), PathBuf::from("<builtin>")),
        };

        let previous_lock = match &config.output.layout_lock {
            Some(path) if path.exists() => Some(LayoutLock::load(path)?),
            _ => None,
        };

        info!(
            functions = catalog.len(),
            groups = catalog.groups().len(),
            versions = registry.snapshots().len(),
            excluded = exclusions.len(),
            "inputs loaded"
        );

        Ok(GenerationInputs {
            catalog,
            registry,
            exclusions,
            template,
            template_source,
            previous_lock,
        })
    }

    /// Load, validate and render everything without touching the outputs.
    pub fn generate(&self) -> Result<Generation> {
        let inputs = self.load_inputs()?;
        self.generate_from(&inputs)
    }

    /// Assemble, audit and render from already loaded inputs.
    pub fn generate_from(&self, inputs: &GenerationInputs) -> Result<Generation> {
        let config = &self.config;
        let current = inputs.registry.current_version()?.clone();

        let unknown: Vec<(String, String)> = inputs
            .registry
            .snapshots()
            .iter()
            .flat_map(|s| {
                s.entries
                    .iter()
                    .filter(|n| !inputs.catalog.contains(n))
                    .map(move |n| (s.version.to_string(), n.clone()))
            })
            .collect();
        if !unknown.is_empty() {
            warn!(entries = unknown.len(), "snapshots reference unknown functions");
            return Err(GenerationError::UnknownSnapshotEntries { entries: unknown });
        }

        let layout = StructLayout::assemble(&inputs.registry);

        let report = self.auditor.audit(&AuditInput {
            catalog: &inputs.catalog,
            layout: &layout,
            exclusions: &inputs.exclusions,
        });
        if !report.is_clean() {
            warn!(violations = report.violations.len(), "catalog audit failed");
            return Err(GenerationError::Consistency(report));
        }

        let lock = layout.lock()?;
        if let Some(previous) = &inputs.previous_lock {
            previous.check_append_only(&lock)?;
            debug!(blocks = previous.blocks.len(), "layout is append-only");
        }

        let Some(current_semver) = current.stable() else {
            return Err(GenerationError::NoStableVersion);
        };
        let ctx = EmitContext {
            config,
            catalog: &inputs.catalog,
            layout: &layout,
            current: current_semver,
        };

        let mut artifacts = vec![
            Artifact::new(
                &config.output.public_header,
                public_header(&ctx, &inputs.template, &inputs.template_source)?,
            ),
            Artifact::new(&config.output.extension_header, extension_header(&ctx)?),
            Artifact::new(&config.output.internal_header, internal_header(&ctx)?),
        ];
        if let Some(path) = &config.output.layout_lock {
            artifacts.push(Artifact::new(path, lock.to_json()?));
        }

        let summary = GenerationSummary {
            current_version: current.to_string(),
            versions: inputs.registry.versions().map(ToString::to_string).collect(),
            total_functions: inputs.catalog.len(),
            struct_functions: layout.field_count(),
            excluded_functions: inputs.exclusions.len(),
            artifacts: artifacts
                .iter()
                .map(|a| ArtifactSummary {
                    path: a.path.clone(),
                    fingerprint: a.fingerprint.clone(),
                })
                .collect(),
        };

        info!(
            current_version = %summary.current_version,
            struct_functions = summary.struct_functions,
            "headers rendered"
        );

        Ok(Generation {
            layout,
            artifacts,
            summary,
        })
    }

    /// Write every artifact, creating parent directories as needed.
    pub fn write(&self, generation: &Generation) -> Result<()> {
        for artifact in &generation.artifacts {
            if let Some(parent) = artifact.path.parent() {
                fs::create_dir_all(parent).map_err(|e| GenerationError::io(parent, e))?;
            }
            fs::write(&artifact.path, &artifact.contents).map_err(|e| GenerationError::io(&artifact.path, e))?;
            info!(path = %artifact.path.display(), "written");
        }
        Ok(())
    }

    /// Artifacts whose file on disk differs from the freshly rendered text.
    pub fn stale_artifacts<'a>(&self, generation: &'a Generation) -> Result<Vec<&'a Artifact>> {
        let mut stale = vec![];
        for artifact in &generation.artifacts {
            let on_disk = match fs::read_to_string(&artifact.path) {
                Ok(text) => Some(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(GenerationError::io(&artifact.path, e)),
            };
            if on_disk.as_deref() != Some(artifact.contents.as_str()) {
                stale.push(artifact);
            }
        }
        Ok(stale)
    }
}
