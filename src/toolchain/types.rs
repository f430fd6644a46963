//! Compile request and report types

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Preprocessor macro definition (`-DNAME` or `-DNAME=VALUE`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Macro {
    pub name: String,
    pub value: Option<String>,
}

impl Macro {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Parse `NAME` or `NAME=VALUE`
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.split_once('=') {
            Some((name, value)) => Self::new(name, Some(value.to_string())),
            None => Self::new(text, None),
        }
    }

    /// Compiler flag form
    #[must_use]
    pub fn flag(&self) -> String {
        format!("-D{self}")
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={value}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One translation unit that needs compiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileUnit {
    pub source: PathBuf,
    pub object: PathBuf,
    /// Searched before the request-wide include directories
    pub include_dirs: Vec<PathBuf>,
}

/// Everything the toolchain needs for one module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileRequest {
    pub module: String,
    /// Units to compile, in order; up-to-date units are left out
    pub units: Vec<CompileUnit>,
    /// Every object to link, compiled now or earlier
    pub objects: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub macros: Vec<Macro>,
    /// Where the linked artifact is written
    pub output: PathBuf,
    /// Symbols the artifact must export.
    ///
    /// Toolchains whose linker exports every default-visibility symbol may
    /// only record the list: `PyMODINIT_FUNC` gives the init routine default
    /// visibility and C linkage.
    pub exports: Vec<String>,
}

/// Result of running the toolchain
#[derive(Debug)]
pub struct ToolchainReport {
    /// Module name
    pub module: String,

    /// Whether every step succeeded
    pub success: bool,

    /// Time spent compiling and linking
    pub duration: Duration,

    /// Error message if failed
    pub error: Option<String>,

    /// Invocations and their output (stdout + stderr)
    pub output: String,

    /// Number of units compiled
    pub compiled: usize,
}

impl ToolchainReport {
    /// Create a successful report
    #[must_use]
    pub const fn success(
        module: String,
        duration: Duration,
        output: String,
        compiled: usize,
    ) -> Self {
        Self {
            module,
            success: true,
            duration,
            error: None,
            output,
            compiled,
        }
    }

    /// Create a failed report
    #[must_use]
    pub const fn failure(
        module: String,
        duration: Duration,
        error: String,
        output: String,
        compiled: usize,
    ) -> Self {
        Self {
            module,
            success: false,
            duration,
            error: Some(error),
            output,
            compiled,
        }
    }
}
