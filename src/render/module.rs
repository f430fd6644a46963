//! Module unit: free-function table, module definition and init routine

use super::lines::CodeWriter;
use crate::descriptor::ModuleDescriptor;

/// Name of the exported init routine for a module
#[must_use]
pub fn init_symbol(module: &str) -> String {
    format!("PyInit_{module}")
}

/// Export aliases for a fragment's free functions.
///
/// Written into the fragment that defines them so the separately compiled
/// module unit can reference them.
pub(crate) fn write_function_exports(out: &mut CodeWriter, module: &ModuleDescriptor) {
    if module.functions.is_empty() {
        return;
    }

    for function in module.functions.values() {
        out.line(format!(
            "PyCFunction {} = (PyCFunction){};",
            function.export_symbol(),
            function.function
        ));
    }
    out.blank();
}

/// Render the module unit for the merged descriptor of every fragment.
///
/// Each type record is finalized and then published in order. A failed
/// finalization aborts the init routine, leaving earlier types published;
/// the host runtime discards the half-built module.
#[must_use]
pub fn render_module(module: &ModuleDescriptor) -> String {
    let name = &module.name;
    let mut out = CodeWriter::new();

    out.line("#include <Python.h>");
    out.blank();

    if !module.types.is_empty() {
        for typ in module.types.values() {
            out.line(format!("extern PyTypeObject {};", typ.record_symbol()));
        }
        out.blank();
    }

    if !module.functions.is_empty() {
        for function in module.functions.values() {
            out.line(format!("extern PyCFunction {};", function.export_symbol()));
        }
        out.blank();
    }

    out.line("static PyMethodDef module_methods[] = {");
    for function in module.functions.values() {
        out.line(format!(
            "    {{\"{}\", {}, {}, \"{name}.{}\"}},",
            function.name,
            function.export_symbol(),
            function.convention.flag(),
            function.name
        ));
    }
    out.line("    {0, 0, 0, 0},");
    out.line("};");
    out.blank();

    out.line("static PyModuleDef module_def = {");
    out.line("    PyModuleDef_HEAD_INIT,");
    out.line(format!("    \"{name}\","));
    out.line("    0,");
    out.line("    -1,");
    out.line("    module_methods,");
    out.line("    0,");
    out.line("    0,");
    out.line("    0,");
    out.line("    0,");
    out.line("};");
    out.blank();

    out.line(format!("PyMODINIT_FUNC {}(void) {{", init_symbol(name)));
    out.line("    PyObject * module = PyModule_Create(&module_def);");
    out.blank();
    out.line("    if (!module) {");
    out.line("        return module;");
    out.line("    }");
    out.blank();

    for typ in module.types.values() {
        let record = typ.record_symbol();
        out.line(format!("    if (PyType_Ready(&{record}) < 0) {{"));
        out.line(format!(
            "        PyErr_Format(PyExc_ImportError, \"Cannot register {}\");",
            typ.name
        ));
        out.line("        return 0;");
        out.line("    }");
        out.blank();
        out.line(format!("    Py_INCREF(&{record});"));
        out.line(format!(
            "    PyModule_AddObject(module, \"{}\", (PyObject *)&{record});",
            typ.name
        ));
        out.blank();
    }

    out.line("    return module;");
    out.line("}");
    out.finish()
}
