//! Append-only per-module build log
//!
//! Every build appends a header, its diagnostics, the cache decision and,
//! when the toolchain runs, its full invocation and output. Nothing is ever
//! truncated; `weld clean` removes the file.

use crate::diagnostic::Diagnostic;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BuildLog {
    path: PathBuf,
    file: File,
}

impl BuildLog {
    /// Open (creating if needed) the log at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a new build section
    pub fn begin(&mut self, module: &str) -> io::Result<()> {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.file)?;
        writeln!(self.file, "== {now} build {module} ==")
    }

    /// One timestamped line
    pub fn note(&mut self, message: &str) -> io::Result<()> {
        let now = chrono::Local::now().format("%H:%M:%S");
        writeln!(self.file, "[{now}] {message}")
    }

    pub fn diagnostics(&mut self, origin: &Path, diagnostics: &[Diagnostic]) -> io::Result<()> {
        for diagnostic in diagnostics {
            self.note(&format!("{}: {diagnostic}", origin.display()))?;
        }
        Ok(())
    }

    /// Raw toolchain output, copied verbatim
    pub fn output(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes())?;
        if !text.is_empty() && !text.ends_with('\n') {
            writeln!(self.file)?;
        }
        Ok(())
    }
}
