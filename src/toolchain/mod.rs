//! Native toolchain
//!
//! The pipeline hands one [`CompileRequest`] per build to a [`Toolchain`]
//! and gets back a [`ToolchainReport`]. [`CcToolchain`] drives a
//! GCC-compatible C++ compiler; tests substitute a recording fake.

pub mod cc;
pub mod types;

pub use cc::{CcToolchain, CompileEnv};
pub use types::{CompileRequest, CompileUnit, Macro, ToolchainReport};

use anyhow::Result;

/// Compiles and links one module
pub trait Toolchain {
    /// Stable description of the compiler and its settings.
    ///
    /// Folded into the build fingerprint, so switching compilers or flags
    /// forces a rebuild.
    fn identity(&self) -> String;

    /// Compile every unit of `request` then link all of its objects.
    ///
    /// A compiler that exits with failure is a failed report, not an error;
    /// `Err` means the toolchain could not be run at all.
    fn build(&self, request: &CompileRequest) -> Result<ToolchainReport>;
}

impl<T: Toolchain + ?Sized> Toolchain for &T {
    fn identity(&self) -> String {
        (**self).identity()
    }

    fn build(&self, request: &CompileRequest) -> Result<ToolchainReport> {
        (**self).build(request)
    }
}
