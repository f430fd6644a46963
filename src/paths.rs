//! Build directory layout.
//!
//! ```text
//! <build_dir>/
//!   <module>.log              append-only build log
//!   <module>.link             link output before it is moved into place
//!   temp/<module>/            workspace, wiped on every rebuild
//!     cache.json              cache entry
//!     source.cpp              inline source
//!     __module__.cpp          module unit
//!     gen/<key>               fragment + generated tables
//!   obj/<module>/             objects, kept across rebuilds
//!     __module__.cpp.o        from workspace files
//!     files/<key>.o           from the caller's files
//! ```
//!
//! Workspace files and the caller's files live in separate namespaces, so
//! no input file name can clash with the module unit.

use crate::platform;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// File name of the generated module unit
pub const MODULE_UNIT: &str = "__module__.cpp";

/// Default artifact path for a module: its name plus the platform suffix.
#[must_use]
pub fn default_output(module: &str) -> PathBuf {
    PathBuf::from(format!("{module}{}", platform::extension_suffix()))
}

/// Map any path to a relative key that stays inside a parent directory.
/// Root and prefix components are dropped and `..` becomes `__`.
#[must_use]
pub fn relative_key(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_os_string()),
            Component::ParentDir => Some(OsString::from("__")),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => None,
        })
        .collect()
}

/// Paths used while building one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    build_dir: PathBuf,
    module: String,
}

impl BuildLayout {
    #[must_use]
    pub fn new(build_dir: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self {
            build_dir: build_dir.into(),
            module: module.into(),
        }
    }

    #[must_use]
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Per-module workspace, owned by the pipeline during a build
    #[must_use]
    pub fn workspace(&self) -> PathBuf {
        self.build_dir.join("temp").join(&self.module)
    }

    #[must_use]
    pub fn objects_dir(&self) -> PathBuf {
        self.build_dir.join("obj").join(&self.module)
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.build_dir.join(format!("{}.log", self.module))
    }

    #[must_use]
    pub fn link_output(&self) -> PathBuf {
        self.build_dir.join(format!("{}.link", self.module))
    }

    #[must_use]
    pub fn cache_entry(&self) -> PathBuf {
        self.workspace().join("cache.json")
    }

    #[must_use]
    pub fn inline_source(&self) -> PathBuf {
        self.workspace().join("source.cpp")
    }

    #[must_use]
    pub fn module_unit(&self) -> PathBuf {
        self.workspace().join(MODULE_UNIT)
    }

    /// Path of `source` relative to the workspace, if it lives there
    fn workspace_key(&self, source: &Path) -> Option<PathBuf> {
        source
            .strip_prefix(self.workspace())
            .ok()
            .map(relative_key)
    }

    /// Where the rendered form of a preprocessed file is written
    #[must_use]
    pub fn generated(&self, source: &Path) -> PathBuf {
        let key = self
            .workspace_key(source)
            .unwrap_or_else(|| relative_key(source));
        self.workspace().join("gen").join(key)
    }

    /// Object file compiled from `source`
    #[must_use]
    pub fn object(&self, source: &Path) -> PathBuf {
        let objects = self.objects_dir();
        let path = self.workspace_key(source).map_or_else(
            || objects.join("files").join(relative_key(source)),
            |key| objects.join(key),
        );
        let mut name = path.into_os_string();
        name.push(platform::object_suffix());
        PathBuf::from(name)
    }
}
