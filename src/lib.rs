//! Weld internal library code
//!
//! Turns annotated C++ fragments into loadable Python extension modules:
//! declarations are recovered from naming conventions, registration tables
//! are generated next to the fragments, and a fingerprint-and-timestamp
//! cache decides whether the toolchain needs to run at all.

pub mod build;
pub mod build_log;
pub mod cache;
pub mod config;
pub mod debug;
pub mod descriptor;
pub mod diagnostic;
pub mod env_vars;
pub mod error;
pub mod host;
pub mod loader;
pub mod paths;
pub mod platform;
pub mod render;
pub mod scanner;
pub mod toolchain;

#[cfg(test)]
mod test_utils;

// Re-export common types for convenience
pub use build::{Artifact, BuildOptions, build_artifact, build_module, is_identifier, load_artifact};
pub use cache::{CacheEntry, CacheStatus, Fingerprint, Stats, collect_stats, human_bytes};
pub use config::Config;
pub use debug::{init_debug, is_debug_enabled};
pub use descriptor::{
    Assembly, CallingConvention, ModuleDescriptor, SlotCategory, TypeDescriptor, assemble,
    assemble_source,
};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::BuildError;
pub use loader::{ArtifactLoader, DylibLoader, LoadedModule, PublishedKind, PublishedName};
pub use paths::BuildLayout;
pub use render::{render_fragment, render_module, render_tables};
pub use scanner::scan;
pub use toolchain::{CcToolchain, CompileEnv, CompileRequest, Macro, Toolchain, ToolchainReport};
