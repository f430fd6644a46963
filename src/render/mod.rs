//! Boilerplate generation
//!
//! Turns descriptors into registration code for the host runtime's
//! native-extension ABI. Each preprocessed fragment gets its own tables
//! appended to it; one extra module unit holds the module definition and
//! the init routine for all fragments.

pub mod lines;
pub mod module;
pub mod tables;

pub use lines::{numbered, with_origin};
pub use module::{init_symbol, render_module};

use crate::descriptor::ModuleDescriptor;
use lines::CodeWriter;
use std::path::Path;

/// Render the generated part of one fragment: free-function exports and
/// every table of every type the fragment declares.
#[must_use]
pub fn render_tables(fragment: &ModuleDescriptor) -> String {
    let mut out = CodeWriter::new();
    out.line("#include <Python.h>");
    out.blank();

    module::write_function_exports(&mut out, fragment);
    for typ in fragment.types.values() {
        tables::write_type(&mut out, &fragment.name, typ);
    }

    out.finish()
}

/// Original fragment followed by its generated tables, with line markers.
#[must_use]
pub fn render_fragment(
    source: &str,
    origin: &Path,
    written: &Path,
    fragment: &ModuleDescriptor,
) -> String {
    with_origin(source, origin, &render_tables(fragment), written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;
    use crate::descriptor::assemble_source;

    #[test]
    fn fragment_keeps_source_before_generated_tables() {
        let source = "struct Foo {\n    PyObject_HEAD\n};\nPyObject * meth_foo(PyObject * self) {\n    Py_RETURN_NONE;\n}\n";
        let assembly = assemble_source("core", source);
        let text = render_fragment(
            source,
            Path::new("foo.cpp"),
            Path::new("build/temp/core/foo.cpp"),
            &assembly.module,
        );

        let source_at = text.find("struct Foo {").unwrap();
        let include_at = text.find("#include <Python.h>").unwrap();
        assert!(source_at < include_at);
        assert!(text.contains("PyCFunction __meth_foo = (PyCFunction)meth_foo;"));
        assert!(text.contains("PyTypeObject Foo_Type = {"));
        assert!(text.contains("#line 9 \"build/temp/core/foo.cpp\""));
    }
}
