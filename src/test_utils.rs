//! Shared test utilities for weld tests
//!
//! This module provides common test helpers, fixtures, and utilities
//! to reduce code duplication across test modules.

pub(crate) mod fixtures {
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    /// A type with one method, one property and one number slot, plus a
    /// free function. Compiles as is once the generated tables are appended.
    pub(crate) const COUNTER_SOURCE: &str = "#include <Python.h>

struct Counter {
    PyObject_HEAD
    long value;
};

PyObject * Counter_meth_increment(Counter * self) {
    self->value += 1;
    Py_RETURN_NONE;
}

PyObject * Counter_get_value(Counter * self, void * closure) {
    return PyLong_FromLong(self->value);
}

PyObject * Counter_nb_add(PyObject * a, PyObject * b) {
    Py_RETURN_NOTIMPLEMENTED;
}

extern PyTypeObject Counter_Type;

PyObject * meth_make_counter(PyObject * self) {
    return PyObject_CallObject((PyObject *)&Counter_Type, 0);
}
";

    /// Write `files` (name, contents) into a fresh temporary directory
    pub(crate) fn temp_sources(files: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let paths = files
            .iter()
            .map(|(name, contents)| {
                let path = temp_dir.path().join(name);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).expect("Failed to create source dir");
                }
                fs::write(&path, contents).expect("Failed to write source");
                path
            })
            .collect();
        (temp_dir, paths)
    }

    /// Set a file's modification time to `seconds` after the epoch,
    /// creating it empty if needed
    pub(crate) fn touch(path: &Path, seconds: u64) {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create parent dir");
            }
            fs::write(path, b"").expect("Failed to create file");
        }
        File::options()
            .write(true)
            .open(path)
            .expect("Failed to open file")
            .set_modified(UNIX_EPOCH + Duration::from_secs(seconds))
            .expect("Failed to set mtime");
    }
}
