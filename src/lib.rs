//! capi-codegen - Versioned Extension C API Generator
//!
//! Builds an ABI-stable function pointer struct and its headers from
//! catalogs of C function signatures.
//!
//! # Invariants
//! 1. Every function name is defined once
//! 2. A function enters the struct in at most one version
//! 3. Excluded functions never enter the struct
//! 4. Every function is either in the struct or excluded
//! 5. Versions order semantically; the unstable snapshot is always last
//! 6. Shipped blocks never move: the layout is append-only

pub mod catalog;
pub mod config;
pub mod emit;
pub mod error;
pub mod exclusion;
pub mod hashing;
pub mod layout;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod validation;
pub mod versions;

pub use catalog::{Catalog, FunctionDefinition, FunctionGroup, Param};
pub use config::GeneratorConfig;
pub use error::GenerationError;
pub use exclusion::ExclusionSet;
pub use layout::{GuardLadder, LayoutLock, StructLayout};
pub use pipeline::{Generation, GenerationInputs, GenerationSummary, Generator};
pub use validation::{AuditReport, Violation, ViolationKind};
pub use versions::{order_versions, ApiVersion, VersionRegistry, VersionSnapshot};

pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");
