//! Loading built artifacts
//!
//! [`DylibLoader`] maps an artifact into the process, checks it exports the
//! module's init routine and resolves every published name to a symbol
//! address. It does not run the init routine; that belongs to the host
//! runtime's import machinery.
//!
//! Extensions leave the runtime's own symbols undefined. On unix the loader
//! first maps the host's shared runtime library with global visibility so
//! those references resolve when the artifact is mapped.
#![allow(unsafe_code)]

use crate::descriptor::ModuleDescriptor;
use crate::host::{self, HostPaths};
use crate::render::init_symbol;
use anyhow::{Context, Result};
use libloading::Library;
use std::ffi::c_void;
use std::path::{Path, PathBuf};

/// What a published name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedKind {
    Type,
    Function,
}

/// A name the module publishes and the symbol backing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedName {
    pub name: String,
    pub symbol: String,
    pub kind: PublishedKind,
}

/// Every name `module` publishes: types first, then free functions
#[must_use]
pub fn published_names(module: &ModuleDescriptor) -> Vec<PublishedName> {
    let types = module.types.values().map(|typ| PublishedName {
        name: typ.name.clone(),
        symbol: typ.record_symbol(),
        kind: PublishedKind::Type,
    });
    let functions = module.functions.values().map(|function| PublishedName {
        name: function.name.clone(),
        symbol: function.export_symbol(),
        kind: PublishedKind::Function,
    });
    types.chain(functions).collect()
}

/// Turns a finished artifact into a module handle
pub trait ArtifactLoader {
    type Module;

    /// # Errors
    ///
    /// Returns the loader's own error, which the caller surfaces verbatim.
    fn load(
        &self,
        artifact: &Path,
        name: &str,
        published: &[PublishedName],
    ) -> Result<Self::Module>;
}

/// Loads artifacts as native shared libraries
#[derive(Debug, Clone, Default)]
pub struct DylibLoader {
    host: HostPaths,
}

impl DylibLoader {
    #[must_use]
    pub const fn new(host: HostPaths) -> Self {
        Self { host }
    }

    /// Loader for the configured interpreter's runtime
    #[must_use]
    pub fn detect() -> Self {
        Self::new(host::host_paths().clone())
    }
}

/// A loaded artifact and the addresses of everything it publishes
#[derive(Debug)]
pub struct LoadedModule {
    name: String,
    path: PathBuf,
    init: usize,
    symbols: Vec<(PublishedName, usize)>,
    // Dropped before `runtime`: the artifact references its symbols.
    #[expect(dead_code, reason = "held so the artifact stays mapped")]
    library: Library,
    runtime: Option<Library>,
}

impl LoadedModule {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Address of the init routine
    #[must_use]
    pub const fn init_address(&self) -> usize {
        self.init
    }

    /// Address of a published type record or function export
    #[must_use]
    pub fn get(&self, name: &str) -> Option<usize> {
        self.symbols
            .iter()
            .find(|(published, _)| published.name == name)
            .map(|(_, address)| *address)
    }

    /// Published names, types first
    pub fn names(&self) -> impl Iterator<Item = &PublishedName> {
        self.symbols.iter().map(|(published, _)| published)
    }

    /// Whether the host runtime library was mapped ahead of the artifact
    #[must_use]
    pub const fn has_runtime(&self) -> bool {
        self.runtime.is_some()
    }
}

impl ArtifactLoader for DylibLoader {
    type Module = LoadedModule;

    fn load(
        &self,
        artifact: &Path,
        name: &str,
        published: &[PublishedName],
    ) -> Result<LoadedModule> {
        // dlopen searches the library path for names without a slash.
        let path = std::path::absolute(artifact)
            .with_context(|| format!("Failed to resolve {}", artifact.display()))?;
        let runtime = open_runtime(&self.host);

        // SAFETY: the artifact was just produced by the pipeline from
        // generated registration code, whose static initializers only fill
        // in tables.
        let library = unsafe { Library::new(&path) }.with_context(|| {
            let hint = if runtime.is_none() && cfg!(unix) {
                " (host runtime library not found; the interpreter may be built without --enable-shared)"
            } else {
                ""
            };
            format!("Failed to load {}{hint}", path.display())
        })?;

        let init = symbol_address(&library, &init_symbol(name))?;
        let mut symbols = Vec::with_capacity(published.len());
        for entry in published {
            let address = symbol_address(&library, &entry.symbol)?;
            symbols.push((entry.clone(), address));
        }

        Ok(LoadedModule {
            name: name.to_string(),
            path,
            init,
            symbols,
            library,
            runtime,
        })
    }
}

/// Places the host runtime library may live, most specific first
#[cfg_attr(not(unix), allow(dead_code))]
fn runtime_candidates(host: &HostPaths) -> Vec<PathBuf> {
    let mut names: Vec<String> = host.runtime_library.iter().cloned().collect();
    if let Some(version) = &host.version {
        for suffix in [".so.1.0", ".so", ".dylib"] {
            names.push(format!("libpython{version}{suffix}"));
        }
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    for name in &names {
        let paths = host.library_dirs.iter().map(|dir| dir.join(name));
        for path in paths.chain([PathBuf::from(name)]) {
            if !candidates.contains(&path) {
                candidates.push(path);
            }
        }
    }
    candidates
}

#[cfg(unix)]
fn open_runtime(host: &HostPaths) -> Option<Library> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};

    for candidate in runtime_candidates(host) {
        // SAFETY: the host runtime library has no initializers beyond its
        // own static setup; the interpreter is not started.
        match unsafe { UnixLibrary::open(Some(&candidate), RTLD_NOW | RTLD_GLOBAL) } {
            Ok(library) => {
                crate::debug!("mapped host runtime {}", candidate.display());
                return Some(Library::from(library));
            }
            Err(e) => crate::debug!("skipping {}: {e}", candidate.display()),
        }
    }
    None
}

// Windows extensions link the runtime's import library directly.
#[cfg(not(unix))]
const fn open_runtime(_host: &HostPaths) -> Option<Library> {
    None
}

fn symbol_address(library: &Library, symbol: &str) -> Result<usize> {
    // SAFETY: the symbol is read as an untyped address and never called
    // or dereferenced here.
    let address = unsafe { library.get::<*const c_void>(symbol.as_bytes()) }
        .with_context(|| format!("Missing export {symbol}"))?;
    Ok(*address as usize)
}
