//! GCC-compatible C++ toolchain
//!
//! Compiles each unit to an object and links every object into a shared
//! library, the equivalent of:
//! ```bash
//! c++ -c a.cpp -o obj/a.cpp.o -fPIC -I... -D...
//! c++ -shared -o core.so obj/a.cpp.o ... -L... -l...
//! ```
//!
//! Shared libraries built this way export every default-visibility symbol,
//! so the request's export list is written to the log rather than passed
//! to the linker. A `-fvisibility=hidden` in `CXXFLAGS` still leaves the
//! init routine exported, since `PyMODINIT_FUNC` sets its visibility.

use super::types::{CompileRequest, CompileUnit, ToolchainReport};
use super::Toolchain;
use crate::host::{self, HostPaths};
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::Instant;

/// Compiler used when neither `CXX` nor the config names one
#[must_use]
pub fn default_compiler() -> String {
    "c++".to_string()
}

/// Everything about the environment a compile depends on.
///
/// Built once and applied to each spawned command; the parent process
/// environment is never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileEnv {
    pub compiler: String,
    /// Extra flags for every compile step
    pub cxxflags: Vec<String>,
    /// Extra flags for the link step
    pub ldflags: Vec<String>,
    /// Environment variables set on every spawned command
    pub vars: Vec<(String, String)>,
    pub host: HostPaths,
}

impl CompileEnv {
    /// Bare environment for `compiler`, with no host paths or extra flags
    #[must_use]
    pub fn new(compiler: impl Into<String>) -> Self {
        Self {
            compiler: compiler.into(),
            ..Self::default()
        }
    }

    /// Read `CXXFLAGS`/`LDFLAGS` and query the host runtime.
    ///
    /// `compiler` overrides the default compiler name.
    #[must_use]
    pub fn detect(compiler: Option<String>) -> Self {
        Self {
            compiler: compiler.unwrap_or_else(default_compiler),
            cxxflags: crate::env_vars::cxxflags(),
            ldflags: crate::env_vars::ldflags(),
            vars: Vec::new(),
            host: host::host_paths().clone(),
        }
    }

    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: HostPaths) -> Self {
        self.host = host;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.compiler);
        cmd.envs(self.vars.iter().map(|(key, value)| (key, value)));
        cmd
    }
}

/// Toolchain driving a GCC-compatible compiler driver
#[derive(Debug, Clone)]
pub struct CcToolchain {
    env: CompileEnv,
}

impl CcToolchain {
    #[must_use]
    pub const fn new(env: CompileEnv) -> Self {
        Self { env }
    }

    #[must_use]
    pub const fn env(&self) -> &CompileEnv {
        &self.env
    }

    /// Arguments for compiling one unit
    #[must_use]
    pub fn compile_args(&self, request: &CompileRequest, unit: &CompileUnit) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-c".into(),
            unit.source.clone().into(),
            "-o".into(),
            unit.object.clone().into(),
        ];
        if !cfg!(windows) {
            args.push("-fPIC".into());
        }

        for dir in unit
            .include_dirs
            .iter()
            .chain(&request.include_dirs)
            .chain(&self.env.host.include_dirs)
        {
            args.push(prefixed("-I", dir));
        }
        args.extend(request.macros.iter().map(|m| OsString::from(m.flag())));
        args.extend(self.env.cxxflags.iter().map(OsString::from));
        args
    }

    /// Arguments for linking every object into the artifact
    #[must_use]
    pub fn link_args(&self, request: &CompileRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-shared".into(),
            "-o".into(),
            request.output.clone().into(),
        ];
        args.extend(request.objects.iter().map(|object| object.clone().into_os_string()));

        if cfg!(target_os = "macos") {
            args.extend(["-undefined".into(), "dynamic_lookup".into()]);
        }

        for dir in request.library_dirs.iter().chain(&self.env.host.library_dirs) {
            args.push(prefixed("-L", dir));
        }
        for library in request.libraries.iter().chain(&self.env.host.libraries) {
            args.push(format!("-l{library}").into());
        }
        args.extend(self.env.ldflags.iter().map(OsString::from));
        args
    }

    fn failure(&self, request: &CompileRequest, status: ExitStatus) -> String {
        format!(
            "{} failed for {} with exit code: {}",
            self.env.compiler,
            request.module,
            status
                .code()
                .map_or_else(|| "unknown".to_string(), |c| c.to_string())
        )
    }
}

impl Toolchain for CcToolchain {
    fn identity(&self) -> String {
        let env = &self.env;
        format!(
            "{} cxxflags={:?} ldflags={:?} vars={:?} host={:?}",
            env.compiler, env.cxxflags, env.ldflags, env.vars, env.host
        )
    }

    fn build(&self, request: &CompileRequest) -> Result<ToolchainReport> {
        let start_time = Instant::now();
        let mut output = String::new();
        let mut compiled = 0;

        for unit in &request.units {
            if let Some(parent) = unit.object.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create object directory {}", parent.display())
                })?;
            }

            let mut cmd = self.env.command();
            cmd.args(self.compile_args(request, unit));
            crate::debug!("Compiling {}", unit.source.display());

            let status = run(&mut cmd, &mut output)
                .with_context(|| format!("Failed to run {}", self.env.compiler))?;
            if !status.success() {
                return Ok(ToolchainReport::failure(
                    request.module.clone(),
                    start_time.elapsed(),
                    self.failure(request, status),
                    output,
                    compiled,
                ));
            }
            compiled += 1;
        }

        if let Some(parent) = request.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory {}", parent.display())
            })?;
        }

        let _ = writeln!(
            output,
            "# exports (default visibility): {}",
            request.exports.join(", ")
        );
        let mut cmd = self.env.command();
        cmd.args(self.link_args(request));
        crate::debug!("Linking {}", request.output.display());

        let status = run(&mut cmd, &mut output)
            .with_context(|| format!("Failed to run {}", self.env.compiler))?;
        if !status.success() {
            return Ok(ToolchainReport::failure(
                request.module.clone(),
                start_time.elapsed(),
                self.failure(request, status),
                output,
                compiled,
            ));
        }

        Ok(ToolchainReport::success(
            request.module.clone(),
            start_time.elapsed(),
            output,
            compiled,
        ))
    }
}

fn prefixed(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path);
    arg
}

/// Run `cmd`, appending the invocation and everything it printed to `output`
fn run(cmd: &mut Command, output: &mut String) -> io::Result<ExitStatus> {
    let _ = write!(output, "$ {}", cmd.get_program().to_string_lossy());
    for arg in cmd.get_args() {
        let _ = write!(output, " {}", arg.to_string_lossy());
    }
    output.push('\n');

    let result = cmd.output()?;
    output.push_str(&String::from_utf8_lossy(&result.stdout));
    output.push_str(&String::from_utf8_lossy(&result.stderr));
    Ok(result.status)
}
