//! Shared test helpers and utilities

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use weld::{ArtifactLoader, CompileRequest, PublishedName, Toolchain, ToolchainReport};

/// Get the path to the weld binary (target/debug/weld)
///
/// This is shared across all integration tests to avoid duplication.
#[allow(dead_code)]
pub(crate) fn get_weld_binary() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .join("target/debug/weld")
        .to_string_lossy()
        .to_string()
}

/// One exported type with a method, a property and a number slot
#[allow(dead_code)]
pub(crate) const POINT_SOURCE: &str = "struct Point {
    PyObject_HEAD
    double x;
};

PyObject * Point_meth_norm(Point * self) {
    return PyFloat_FromDouble(self->x);
}

PyObject * Point_get_x(Point * self, void * closure) {
    return PyFloat_FromDouble(self->x);
}

PyObject * Point_nb_add(PyObject * a, PyObject * b) {
    Py_RETURN_NOTIMPLEMENTED;
}
";

/// Free functions only
#[allow(dead_code)]
pub(crate) const HELPERS_SOURCE: &str = "PyObject * meth_origin(PyObject * self) {
    Py_RETURN_NONE;
}

PyObject * meth_scale(PyObject * self, PyObject * args, PyObject * kwargs) {
    Py_RETURN_NONE;
}
";

/// Write a source file into `temp_dir`, returning its path
#[allow(dead_code)]
pub(crate) fn write_source(temp_dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = temp_dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create source dir");
    }
    fs::write(&path, contents).expect("Failed to write source");
    path
}

/// Set a file's modification time relative to now
#[allow(dead_code)]
pub(crate) fn shift_mtime(path: &Path, offset: Duration, forward: bool) {
    let now = std::time::SystemTime::now();
    let time = if forward { now + offset } else { now - offset };
    fs::File::options()
        .write(true)
        .open(path)
        .expect("Failed to open file")
        .set_modified(time)
        .expect("Failed to set mtime");
}

/// Toolchain stand-in that writes placeholder objects and artifacts and
/// remembers every request it saw
#[allow(dead_code)]
#[derive(Debug, Default)]
pub(crate) struct RecordingToolchain {
    requests: RefCell<Vec<CompileRequest>>,
    fail: Cell<bool>,
}

#[allow(dead_code)]
impl RecordingToolchain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every following build fail
    pub(crate) fn fail_next_builds(&self) {
        self.fail.set(true);
    }

    pub(crate) fn builds(&self) -> usize {
        self.requests.borrow().len()
    }

    pub(crate) fn last_request(&self) -> CompileRequest {
        self.requests
            .borrow()
            .last()
            .cloned()
            .expect("toolchain was never run")
    }

    /// Sources compiled by the most recent build, by file name
    pub(crate) fn last_compiled(&self) -> Vec<String> {
        self.last_request()
            .units
            .iter()
            .filter_map(|unit| unit.source.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect()
    }
}

impl Toolchain for RecordingToolchain {
    fn identity(&self) -> String {
        "recording".to_string()
    }

    fn build(&self, request: &CompileRequest) -> anyhow::Result<ToolchainReport> {
        self.requests.borrow_mut().push(request.clone());

        let mut output = String::new();
        for unit in &request.units {
            writeln!(output, "$ cc -c {}", unit.source.display())?;
        }

        if self.fail.get() {
            output.push_str("error: expected ';' after struct\n");
            return Ok(ToolchainReport::failure(
                request.module.clone(),
                Duration::ZERO,
                "cc failed with exit code: 1".to_string(),
                output,
                request.units.len(),
            ));
        }

        for unit in &request.units {
            if let Some(parent) = unit.object.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&unit.object, b"object")?;
        }
        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&request.output, request.exports.join("\n"))?;

        Ok(ToolchainReport::success(
            request.module.clone(),
            Duration::ZERO,
            output,
            request.units.len(),
        ))
    }
}

/// Loader stand-in that hands back the published names it was given
#[allow(dead_code)]
#[derive(Debug, Default)]
pub(crate) struct RecordingLoader {
    loads: Cell<usize>,
}

#[allow(dead_code)]
impl RecordingLoader {
    pub(crate) fn loads(&self) -> usize {
        self.loads.get()
    }
}

impl ArtifactLoader for RecordingLoader {
    type Module = Vec<PublishedName>;

    fn load(
        &self,
        artifact: &Path,
        _name: &str,
        published: &[PublishedName],
    ) -> anyhow::Result<Self::Module> {
        self.loads.set(self.loads.get() + 1);
        anyhow::ensure!(artifact.exists(), "{} does not exist", artifact.display());
        Ok(published.to_vec())
    }
}
