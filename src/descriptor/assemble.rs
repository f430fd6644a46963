//! Two-pass descriptor assembly
//!
//! Pass one collects every type declaration into the module. Pass two
//! classifies each function against the now complete set of type names:
//! `meth_<name>` is a free function, `<Type>_<rest>` belongs to a known
//! type's tables, and anything else is reported and left out.

use super::slots::{Slot, SlotCategory};
use super::types::{
    CallingConvention, MethodDescriptor, ModuleDescriptor, ModuleFunctionDescriptor,
    PropertyDescriptor, TypeDescriptor,
};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::scanner::{self, FunctionDecl, ScannedSource};

/// Reserved prefix marking a module-level function
pub const FREE_FUNCTION_PREFIX: &str = "meth";

/// Classification of the `<rest>` of a `<Type>_<rest>` function name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopedKind {
    /// `meth_<name>`
    Method(String),
    /// `get_<name>`
    Getter(String),
    /// `set_<name>`
    Setter(String),
    /// `<xx>_<slot>` with a known category and slot
    Slot(Slot),
    /// Anything else, kept verbatim for the diagnostic
    Unclassified { raw: String, kind: DiagnosticKind },
}

impl ScopedKind {
    /// Classify the part of a type-scoped name after `<Type>_`
    #[must_use]
    pub fn classify(rest: &str) -> Self {
        let unclassified = |kind| Self::Unclassified {
            raw: rest.to_string(),
            kind,
        };

        let Some((kind, name)) = rest.split_once('_') else {
            return unclassified(DiagnosticKind::MalformedScopedName);
        };
        if kind.is_empty() || name.is_empty() {
            return unclassified(DiagnosticKind::MalformedScopedName);
        }

        match kind {
            "meth" => Self::Method(name.to_string()),
            "get" => Self::Getter(name.to_string()),
            "set" => Self::Setter(name.to_string()),
            _ => match SlotCategory::from_prefix(kind) {
                Some(category) => category
                    .slot(name)
                    .map_or_else(|| unclassified(DiagnosticKind::UnknownSlot), Self::Slot),
                None => unclassified(DiagnosticKind::UnknownPrefix),
            },
        }
    }
}

/// An assembled module plus everything reported while assembling it
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub module: ModuleDescriptor,
    pub diagnostics: Vec<Diagnostic>,
}

/// Scan `source` and assemble its declarations
#[must_use]
pub fn assemble_source(module: &str, source: &str) -> Assembly {
    assemble(module, &scanner::scan(source))
}

/// Assemble scanned declarations into a module descriptor
#[must_use]
pub fn assemble(module: &str, scanned: &ScannedSource) -> Assembly {
    let mut assembly = Assembly {
        module: ModuleDescriptor::new(module),
        diagnostics: Vec::new(),
    };

    for decl in &scanned.types {
        let descriptor = TypeDescriptor::new(&decl.name, &decl.header, decl.line);
        if assembly
            .module
            .types
            .insert(&decl.name, descriptor)
            .is_some()
        {
            assembly.diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateDeclaration,
                decl.line,
                &decl.name,
                format!(
                    "type {} is declared more than once; the last declaration wins",
                    decl.name
                ),
            ));
        }
    }

    for function in &scanned.functions {
        classify_function(&mut assembly, function);
    }

    assembly
}

fn classify_function(assembly: &mut Assembly, function: &FunctionDecl) {
    let full_name = function.name();
    let diagnostics = &mut assembly.diagnostics;

    if function.prefix == FREE_FUNCTION_PREFIX {
        let Some(convention) = convention_for(function, &full_name, diagnostics) else {
            return;
        };
        let descriptor = ModuleFunctionDescriptor {
            name: function.rest.clone(),
            function: full_name.clone(),
            convention,
            line: function.line,
        };
        if assembly
            .module
            .functions
            .insert(&function.rest, descriptor)
            .is_some()
        {
            diagnostics.push(duplicate(function, &full_name, "module function"));
        }
        return;
    }

    let Some(owner) = assembly.module.types.get_mut(&function.prefix) else {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnknownType,
            function.line,
            &full_name,
            format!("Unknown type {} in {full_name}", function.prefix),
        ));
        return;
    };

    match ScopedKind::classify(&function.rest) {
        ScopedKind::Method(name) => {
            let Some(convention) = convention_for(function, &full_name, diagnostics) else {
                return;
            };
            let descriptor = MethodDescriptor {
                name: name.clone(),
                owner: Some(owner.name.clone()),
                function: full_name.clone(),
                convention,
                line: function.line,
            };
            if owner.methods.insert(&name, descriptor).is_some() {
                diagnostics.push(duplicate(function, &full_name, "method"));
            }
        }
        ScopedKind::Getter(name) => {
            let replaced = owner
                .properties
                .get_or_insert_with(&name, || PropertyDescriptor::new(&name))
                .and_then(|property| property.getter.replace(full_name.clone()));
            if replaced.is_some() {
                diagnostics.push(duplicate(function, &full_name, "getter"));
            }
        }
        ScopedKind::Setter(name) => {
            let replaced = owner
                .properties
                .get_or_insert_with(&name, || PropertyDescriptor::new(&name))
                .and_then(|property| property.setter.replace(full_name.clone()));
            if replaced.is_some() {
                diagnostics.push(duplicate(function, &full_name, "setter"));
            }
        }
        ScopedKind::Slot(slot) => {
            if owner.slots.set(slot, full_name.clone()).is_some() {
                diagnostics.push(duplicate(function, &full_name, "slot"));
            }
        }
        ScopedKind::Unclassified { raw, kind } => {
            let message = match kind {
                DiagnosticKind::MalformedScopedName => {
                    format!("{full_name} should be {}_meth_{raw}", function.prefix)
                }
                DiagnosticKind::UnknownSlot => {
                    format!("Unknown slot {raw} for {full_name}")
                }
                _ => {
                    let prefix = raw.split_once('_').map_or(raw.as_str(), |(kind, _)| kind);
                    format!("Unknown prefix \"{prefix}\" in {full_name}")
                }
            };
            diagnostics.push(Diagnostic::new(kind, function.line, &full_name, message));
        }
    }
}

/// Calling convention of a callable, or a diagnostic if it has none
fn convention_for(
    function: &FunctionDecl,
    full_name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<CallingConvention> {
    let convention = CallingConvention::from_arity(function.arity());
    if convention.is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::TooManyParameters,
            function.line,
            full_name,
            format!(
                "{full_name} takes {} parameters after the receiver; at most 2 are supported",
                function.arity()
            ),
        ));
    }
    convention
}

fn duplicate(function: &FunctionDecl, full_name: &str, what: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::DuplicateDeclaration,
        function.line,
        full_name,
        format!("{full_name} redeclares a {what}; the last declaration wins"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;

    const VECTOR: &str = r#"
struct Vec2 {
    PyObject_HEAD
    double x;
    double y;
};

PyObject * Vec2_meth_length(Vec2 * self) {
    return PyFloat_FromDouble(0.0);
}

PyObject * Vec2_meth_scale(Vec2 * self, PyObject * args) {
    Py_RETURN_NONE;
}

PyObject * Vec2_meth_replace(Vec2 * self, PyObject * args, PyObject * kwargs) {
    Py_RETURN_NONE;
}

PyObject * Vec2_get_x(Vec2 * self, void * closure) {
    return PyFloat_FromDouble(self->x);
}

int Vec2_set_y(Vec2 * self, PyObject * value, void * closure) {
    return 0;
}

PyObject * Vec2_get_y(Vec2 * self, void * closure) {
    return PyFloat_FromDouble(self->y);
}

PyObject * Vec2_nb_add(PyObject * a, PyObject * b) {
    Py_RETURN_NOTIMPLEMENTED;
}

PyObject * Vec2_tp_repr(Vec2 * self) {
    return PyUnicode_FromString("Vec2");
}

PyObject * meth_zero(PyObject * module) {
    Py_RETURN_NONE;
}
"#;

    #[test]
    fn classify_scoped_names() {
        assert_eq!(
            ScopedKind::classify("meth_norm"),
            ScopedKind::Method("norm".to_string())
        );
        assert_eq!(
            ScopedKind::classify("get_x"),
            ScopedKind::Getter("x".to_string())
        );
        assert_eq!(
            ScopedKind::classify("set_x"),
            ScopedKind::Setter("x".to_string())
        );
        assert_eq!(
            ScopedKind::classify("nb_inplace_add"),
            ScopedKind::Slot(SlotCategory::Number.slot("inplace_add").unwrap())
        );
        assert!(matches!(
            ScopedKind::classify("zz_add"),
            ScopedKind::Unclassified {
                kind: DiagnosticKind::UnknownPrefix,
                ..
            }
        ));
        assert!(matches!(
            ScopedKind::classify("nb_frobnicate"),
            ScopedKind::Unclassified {
                kind: DiagnosticKind::UnknownSlot,
                ..
            }
        ));
        assert!(matches!(
            ScopedKind::classify("norm"),
            ScopedKind::Unclassified {
                kind: DiagnosticKind::MalformedScopedName,
                ..
            }
        ));
    }

    #[test]
    fn assembles_full_type() {
        let assembly = assemble_source("geometry", VECTOR);
        assert!(assembly.diagnostics.is_empty(), "{:?}", assembly.diagnostics);

        let vec2 = assembly.module.types.get("Vec2").unwrap();
        let methods: Vec<_> = vec2
            .methods
            .values()
            .map(|m| (m.name.as_str(), m.convention))
            .collect();
        assert_eq!(
            methods,
            [
                ("length", CallingConvention::NoArgs),
                ("scale", CallingConvention::Positional),
                ("replace", CallingConvention::PositionalKeyword),
            ]
        );

        let x = vec2.properties.get("x").unwrap();
        assert_eq!(x.getter.as_deref(), Some("Vec2_get_x"));
        assert_eq!(x.setter, None);

        // Setter declared before getter still yields one property, placed
        // where it first appeared
        assert_eq!(vec2.properties.keys().collect::<Vec<_>>(), ["x", "y"]);
        let y = vec2.properties.get("y").unwrap();
        assert_eq!(y.getter.as_deref(), Some("Vec2_get_y"));
        assert_eq!(y.setter.as_deref(), Some("Vec2_set_y"));

        assert_eq!(
            vec2.slots.named(SlotCategory::Number, "add"),
            Some("Vec2_nb_add")
        );
        assert_eq!(
            vec2.slots.named(SlotCategory::TypeRecord, "repr"),
            Some("Vec2_tp_repr")
        );

        let zero = assembly.module.functions.get("zero").unwrap();
        assert_eq!(zero.function, "meth_zero");
        assert_eq!(zero.convention, CallingConvention::NoArgs);
    }

    #[test]
    fn unknown_slot_prefix_is_excluded_and_reported() {
        let source = format!(
            "{VECTOR}\nPyObject * Vec2_zz_frob(Vec2 * self) {{\n    Py_RETURN_NONE;\n}}\n"
        );
        let assembly = assemble_source("geometry", &source);

        assert_eq!(assembly.diagnostics.len(), 1);
        let diagnostic = assembly.diagnostics.first().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::UnknownPrefix);
        assert_eq!(diagnostic.function, "Vec2_zz_frob");
        assert!(diagnostic.message.contains("\"zz\""));

        // Everything else is still generated
        let vec2 = assembly.module.types.get("Vec2").unwrap();
        assert_eq!(vec2.methods.len(), 3);
        assert_eq!(vec2.properties.len(), 2);
        assert!(!vec2.methods.contains("frob"));
    }

    #[test]
    fn unknown_type_prefix_is_reported() {
        let source = "PyObject * Nope_meth_x(PyObject * self) {\n}\n";
        let assembly = assemble_source("m", source);

        assert!(assembly.module.is_empty());
        let diagnostic = assembly.diagnostics.first().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::UnknownType);
        assert_eq!(diagnostic.message, "Unknown type Nope in Nope_meth_x");
    }

    #[test]
    fn functions_before_their_type_still_bind() {
        let source = "PyObject * Late_meth_hi(Late * self) {\n}\nstruct Late {\n    PyObject_HEAD\n};\n";
        let assembly = assemble_source("m", source);

        assert!(assembly.diagnostics.is_empty());
        assert!(assembly.module.types.get("Late").unwrap().methods.contains("hi"));
    }

    #[test]
    fn too_many_parameters_is_reported() {
        let source = "PyObject * meth_wide(PyObject * self, PyObject * a, PyObject * b, PyObject * c) {\n}\n";
        let assembly = assemble_source("m", source);

        assert!(assembly.module.functions.is_empty());
        assert_eq!(
            assembly.diagnostics.first().unwrap().kind,
            DiagnosticKind::TooManyParameters
        );
    }

    #[test]
    fn duplicate_method_last_declaration_wins() {
        let source = "struct T {\n    PyObject_HEAD\n};\nPyObject * T_meth_a(T * self) {\n}\nPyObject * T_meth_b(T * self) {\n}\nPyObject * T_meth_a(T * self, PyObject * args) {\n}\n";
        let assembly = assemble_source("m", source);

        let t = assembly.module.types.get("T").unwrap();
        assert_eq!(t.methods.keys().collect::<Vec<_>>(), ["a", "b"]);
        let a = t.methods.get("a").unwrap();
        assert_eq!(a.convention, CallingConvention::Positional);
        assert_eq!(a.line, 8);

        assert_eq!(assembly.diagnostics.len(), 1);
        assert_eq!(
            assembly.diagnostics.first().unwrap().kind,
            DiagnosticKind::DuplicateDeclaration
        );
    }

    #[test]
    fn malformed_scoped_name_suggests_method_form() {
        let source = "struct T {\n    PyObject_HEAD\n};\nPyObject * T_hello(T * self) {\n}\n";
        let assembly = assemble_source("m", source);

        let diagnostic = assembly.diagnostics.first().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::MalformedScopedName);
        assert_eq!(diagnostic.message, "T_hello should be T_meth_hello");
    }
}
