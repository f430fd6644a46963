//! Errors surfaced by the build entry point

use std::path::PathBuf;
use thiserror::Error;

/// Failure of one build call.
///
/// Diagnostics never show up here: they are logged and generation carries on.
/// Cache corruption never shows up either; it is downgraded to a miss.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Conflicting or malformed arguments, rejected before any I/O
    #[error("usage: {0}")]
    Usage(String),

    /// The toolchain exited with a failure status
    #[error("failed to compile module {module}\n{log}\n{listing}")]
    Compile {
        module: String,
        /// Everything the toolchain printed, invocations included
        log: String,
        /// Line-numbered listing of every generated file
        listing: String,
    },

    /// The artifact was built but could not be loaded
    #[error("failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The toolchain could not be run at all
    #[error("{0:#}")]
    Toolchain(anyhow::Error),
}

impl BuildError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Attach a message to I/O failures, the way `anyhow::Context` does
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, context: F) -> Result<T, BuildError>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, context: F) -> Result<T, BuildError>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| BuildError::io(context(), source))
    }
}
