//! Generator Configuration
//!
//! Every knob the generator reads is carried in one immutable
//! [`GeneratorConfig`] value and passed to the pipeline explicitly.
//! Configuration is loaded from:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Environment variables (prefixed with `CAPI_GEN_`, `__` separates nesting)
//!
//! ```no_run
//! use capi_codegen::config::GeneratorConfig;
//!
//! let config = GeneratorConfig::load("capi-gen.toml")?;
//! println!("struct: {}", config.struct_typename);
//! # Ok::<(), figment::Error>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::versions::ApiVersion;

/// Top-level generator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    /// Directory scanned recursively for function group records
    pub functions_dir: PathBuf,
    /// Directory scanned recursively for version snapshot records
    pub api_dir: PathBuf,
    /// Exclusion list record (skipped while scanning `api_dir`)
    pub exclusion_file: PathBuf,
    /// Optional template for the public header
    #[serde(default)]
    pub header_template: Option<PathBuf>,
    /// Marker in the template replaced by the generated declarations
    pub content_mark: String,
    /// Template text before this marker is dropped
    pub start_mark: String,
    /// Artifact locations
    pub output: OutputConfig,
    /// Project named in the generated-file banner
    pub project_name: String,
    pub struct_typename: String,
    pub api_variable: String,
    /// Prefix of every emitted macro, e.g. `DUCKDB`
    pub macro_prefix: String,
    /// Prefix of the C types referenced by the entrypoint macros, e.g. `duckdb`
    pub symbol_prefix: String,
    /// Error value of the host's state enum, checked by the entrypoint macro
    pub error_state: String,
    /// Literal identifier of the unstable snapshot
    pub dev_tag: String,
    pub create_method: String,
    pub allow_uncommented_params: bool,
    /// Display order of function groups in the public header
    pub group_order: Vec<String>,
}

/// Where the generated artifacts are written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    pub public_header: PathBuf,
    pub extension_header: PathBuf,
    pub internal_header: PathBuf,
    /// Append-only layout lock, kept outside the `*.json` snapshot scan.
    /// Only an embedder can disable it, by setting `None`.
    #[serde(default)]
    pub layout_lock: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            public_header: PathBuf::from("include/duckdb.h"),
            extension_header: PathBuf::from("include/duckdb_extension.h"),
            internal_header: PathBuf::from("include/duckdb/main/capi/extension_api.hpp"),
            layout_lock: Some(PathBuf::from("header_generation/apis/v0/layout.lock")),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            functions_dir: PathBuf::from("header_generation/functions"),
            api_dir: PathBuf::from("header_generation/apis/v0"),
            exclusion_file: PathBuf::from("header_generation/apis/v0/exclusion_list.json"),
            header_template: None,
            content_mark: "// DUCKDB_FUNCTIONS_ARE_GENERATED_HERE".to_string(),
            start_mark: "// DUCKDB_START_OF_HEADER".to_string(),
            output: OutputConfig::default(),
            project_name: "DuckDB".to_string(),
            struct_typename: "duckdb_ext_api_v0".to_string(),
            api_variable: "duckdb_ext_api".to_string(),
            macro_prefix: "DUCKDB".to_string(),
            symbol_prefix: "duckdb".to_string(),
            error_state: "DuckDBError".to_string(),
            dev_tag: "dev".to_string(),
            create_method: "CreateAPIv0".to_string(),
            allow_uncommented_params: true,
            group_order: default_group_order(),
        }
    }
}

fn default_group_order() -> Vec<String> {
    [
        "open_connect",
        "configuration",
        "query_execution",
        "result_functions",
        "safe_fetch_functions",
        "helpers",
        "date_time_timestamp_helpers",
        "hugeint_helpers",
        "unsigned_hugeint_helpers",
        "decimal_helpers",
        "prepared_statements",
        "bind_values_to_prepared_statements",
        "execute_prepared_statements",
        "extract_statements",
        "pending_result_interface",
        "value_interface",
        "logical_type_interface",
        "data_chunk_interface",
        "vector_interface",
        "validity_mask_functions",
        "scalar_functions",
        "aggregate_functions",
        "table_functions",
        "table_function_bind",
        "table_function_init",
        "table_function",
        "replacement_scans",
        "profiling_info",
        "appender",
        "table_description",
        "arrow_interface",
        "threading_information",
        "streaming_result_interface",
        "cast_functions",
    ]
    .iter()
    .map(|g| g.to_string())
    .collect()
}

impl GeneratorConfig {
    /// Load configuration from a TOML file layered over the defaults.
    ///
    /// A missing file is not an error; the defaults and environment apply.
    /// Example override: `CAPI_GEN_OUTPUT__LAYOUT_LOCK=api.lock.json`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(GeneratorConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CAPI_GEN_").split("__"))
            .extract()
    }

    /// Resolve every relative input and output path against `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { root.join(p) };
        self.functions_dir = join(&self.functions_dir);
        self.api_dir = join(&self.api_dir);
        self.exclusion_file = join(&self.exclusion_file);
        self.header_template = self.header_template.as_ref().map(join);
        self.output.public_header = join(&self.output.public_header);
        self.output.extension_header = join(&self.output.extension_header);
        self.output.internal_header = join(&self.output.internal_header);
        self.output.layout_lock = self.output.layout_lock.as_ref().map(join);
        self
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if !is_c_identifier(&self.struct_typename) {
            return Err(format!(
                "Invalid struct_typename '{}'. Must be a C identifier",
                self.struct_typename
            ));
        }
        if !is_c_identifier(&self.api_variable) {
            return Err(format!(
                "Invalid api_variable '{}'. Must be a C identifier",
                self.api_variable
            ));
        }
        if !is_c_identifier(&self.macro_prefix) {
            return Err(format!(
                "Invalid macro_prefix '{}'. Must be a C identifier",
                self.macro_prefix
            ));
        }
        if !is_c_identifier(&self.create_method) {
            return Err(format!(
                "Invalid create_method '{}'. Must be a C identifier",
                self.create_method
            ));
        }
        if self.dev_tag.is_empty() || ApiVersion::parse(&self.dev_tag, "").is_ok() {
            return Err(format!(
                "Invalid dev_tag '{}'. Must be non-empty and must not be a vX.Y.Z version",
                self.dev_tag
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for group in &self.group_order {
            if !seen.insert(group) {
                return Err(format!("Duplicate group in group_order: {}", group));
            }
        }

        Ok(())
    }

    /// `<PREFIX>_EXTENSION_<suffix>`
    pub fn ext_macro(&self, suffix: &str) -> String {
        format!("{}_EXTENSION_{}", self.macro_prefix, suffix)
    }
}

fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
