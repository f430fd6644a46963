//! Per-type registration tables
//!
//! For each type: a method table, a property table, one sub-table per
//! overridden protocol category and the type record itself. Tables are
//! sentinel-terminated and every record follows the ABI field order.

use super::lines::CodeWriter;
use crate::descriptor::{SlotCategory, TypeDescriptor};

/// One field of `PyTypeObject`, in declaration order
#[derive(Debug, Clone, Copy)]
enum RecordField {
    Name,
    BasicSize,
    /// Field this generator never fills
    Zero(&'static str),
    /// Overridable `tp_*` slot, by slot name
    Slot(&'static str),
    /// Pointer to a protocol sub-table
    SubTable(SlotCategory),
    Methods,
    GetSet,
    Flags,
    Doc,
}

const RECORD_FIELDS: &[RecordField] = &[
    RecordField::Name,
    RecordField::BasicSize,
    RecordField::Zero("tp_itemsize"),
    RecordField::Slot("dealloc"),
    RecordField::Zero("tp_vectorcall_offset"),
    RecordField::Zero("tp_getattr"),
    RecordField::Zero("tp_setattr"),
    RecordField::SubTable(SlotCategory::Async),
    RecordField::Slot("repr"),
    RecordField::SubTable(SlotCategory::Number),
    RecordField::SubTable(SlotCategory::Sequence),
    RecordField::SubTable(SlotCategory::Mapping),
    RecordField::Slot("hash"),
    RecordField::Slot("call"),
    RecordField::Slot("str"),
    RecordField::Slot("getattro"),
    RecordField::Slot("setattro"),
    RecordField::SubTable(SlotCategory::Buffer),
    RecordField::Flags,
    RecordField::Doc,
    RecordField::Slot("traverse"),
    RecordField::Slot("clear"),
    RecordField::Slot("richcompare"),
    RecordField::Zero("tp_weaklistoffset"),
    RecordField::Slot("iter"),
    RecordField::Slot("iternext"),
    RecordField::Methods,
    RecordField::Zero("tp_members"),
    RecordField::GetSet,
    RecordField::Slot("base"),
    RecordField::Zero("tp_dict"),
    RecordField::Zero("tp_descr_get"),
    RecordField::Zero("tp_descr_set"),
    RecordField::Zero("tp_dictoffset"),
    RecordField::Slot("init"),
    RecordField::Slot("alloc"),
    RecordField::Slot("new"),
    RecordField::Slot("free"),
    RecordField::Zero("tp_is_gc"),
    RecordField::Zero("tp_bases"),
    RecordField::Zero("tp_mro"),
    RecordField::Zero("tp_cache"),
    RecordField::Zero("tp_subclasses"),
    RecordField::Zero("tp_weaklist"),
    RecordField::Slot("del"),
    RecordField::Zero("tp_version_tag"),
    RecordField::Slot("finalize"),
];

/// Symbol of a type's method table
#[must_use]
pub fn methods_symbol(typ: &TypeDescriptor) -> String {
    format!("{}_tp_methods", typ.name)
}

/// Symbol of a type's property table
#[must_use]
pub fn getset_symbol(typ: &TypeDescriptor) -> String {
    format!("{}_tp_getset", typ.name)
}

fn sub_table_symbol(typ: &TypeDescriptor, field: &str) -> String {
    format!("{}_{field}", typ.name)
}

fn cast_or_null(cast: &str, function: Option<&str>) -> String {
    function.map_or_else(|| "0".to_string(), |function| format!("({cast}){function}"))
}

/// Render every table belonging to one type
pub(crate) fn write_type(out: &mut CodeWriter, module: &str, typ: &TypeDescriptor) {
    write_methods(out, module, typ);
    write_getset(out, module, typ);
    for category in SlotCategory::ALL {
        write_sub_table(out, typ, category);
    }
    write_record(out, module, typ);
}

fn write_methods(out: &mut CodeWriter, module: &str, typ: &TypeDescriptor) {
    out.line(format!("PyMethodDef {}[] = {{", methods_symbol(typ)));
    for method in typ.methods.values() {
        out.line(format!(
            "    {{\"{name}\", (PyCFunction){function}, {flags}, \"{module}.{owner}.{name}\"}},",
            name = method.name,
            function = method.function,
            flags = method.convention.flag(),
            owner = typ.name,
        ));
    }
    out.line("    {0, 0, 0, 0},");
    out.line("};");
    out.blank();
}

fn write_getset(out: &mut CodeWriter, module: &str, typ: &TypeDescriptor) {
    out.line(format!("PyGetSetDef {}[] = {{", getset_symbol(typ)));
    for property in typ.properties.values() {
        out.line(format!(
            "    {{\"{name}\", {getter}, {setter}, \"{module}.{owner}.{name}\", 0}},",
            name = property.name,
            getter = cast_or_null("getter", property.getter.as_deref()),
            setter = cast_or_null("setter", property.setter.as_deref()),
            owner = typ.name,
        ));
    }
    out.line("    {0, 0, 0, 0, 0},");
    out.line("};");
    out.blank();
}

fn write_sub_table(out: &mut CodeWriter, typ: &TypeDescriptor, category: SlotCategory) {
    let Some((struct_name, field)) = category.sub_table() else {
        return;
    };
    if !typ.slots.any(category) {
        return;
    }

    out.line(format!(
        "{struct_name} {} = {{",
        sub_table_symbol(typ, field)
    ));
    for (entry, function) in category
        .layout()
        .iter()
        .zip(typ.slots.category(category))
    {
        match entry {
            Some(spec) => out.line(format!(
                "    {}, /* {}_{} */",
                cast_or_null(spec.cast, function.as_deref()),
                category.prefix(),
                spec.name
            )),
            None => out.line("    0, /* reserved */"),
        }
    }
    out.line("};");
    out.blank();
}

fn write_record(out: &mut CodeWriter, module: &str, typ: &TypeDescriptor) {
    out.line(format!("PyTypeObject {} = {{", typ.record_symbol()));
    out.line("    PyVarObject_HEAD_INIT(0, 0)");

    for field in RECORD_FIELDS {
        let (value, label) = match *field {
            RecordField::Name => (format!("\"{module}.{}\"", typ.name), "tp_name".to_string()),
            RecordField::BasicSize => (format!("sizeof({})", typ.name), "tp_basicsize".to_string()),
            RecordField::Zero(label) => ("0".to_string(), label.to_string()),
            RecordField::Slot(name) => {
                let cast = SlotCategory::TypeRecord
                    .slot(name)
                    .and_then(|slot| slot.spec())
                    .map_or("void *", |spec| spec.cast);
                (
                    cast_or_null(cast, typ.slots.named(SlotCategory::TypeRecord, name)),
                    format!("tp_{name}"),
                )
            }
            RecordField::SubTable(category) => {
                let field = category.sub_table().map_or("", |(_, field)| field);
                let value = if typ.slots.any(category) {
                    format!("&{}", sub_table_symbol(typ, field))
                } else {
                    "0".to_string()
                };
                (value, field.to_string())
            }
            RecordField::Methods => (methods_symbol(typ), "tp_methods".to_string()),
            RecordField::GetSet => (getset_symbol(typ), "tp_getset".to_string()),
            RecordField::Flags => ("Py_TPFLAGS_DEFAULT".to_string(), "tp_flags".to_string()),
            RecordField::Doc => (format!("\"{module}.{}\"", typ.name), "tp_doc".to_string()),
        };
        out.line(format!("    {value}, /* {label} */"));
    }

    out.line("};");
    out.blank();
}
