//! Protocol slot categories
//!
//! A type-scoped function named `<Type>_<xx>_<slot>` overrides one entry of
//! the type record or of one of its protocol sub-tables. The two-letter `xx`
//! prefix selects the [`SlotCategory`]; the slot name must appear in that
//! category's ABI layout. Layouts list every field of the sub-table in ABI
//! order; `None` marks a reserved field that is always rendered as `0`.

use std::fmt;

/// One overridable ABI field: its slot name and the C function-pointer type
/// the reference is cast to when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: &'static str,
    pub cast: &'static str,
}

const fn spec(name: &'static str, cast: &'static str) -> Option<SlotSpec> {
    Some(SlotSpec { name, cast })
}

const ASYNC_LAYOUT: &[Option<SlotSpec>] = &[
    spec("await", "unaryfunc"),
    spec("aiter", "unaryfunc"),
    spec("anext", "unaryfunc"),
];

const BUFFER_LAYOUT: &[Option<SlotSpec>] = &[
    spec("getbuffer", "getbufferproc"),
    spec("releasebuffer", "releasebufferproc"),
];

const MAPPING_LAYOUT: &[Option<SlotSpec>] = &[
    spec("length", "lenfunc"),
    spec("subscript", "binaryfunc"),
    spec("ass_subscript", "objobjargproc"),
];

const NUMBER_LAYOUT: &[Option<SlotSpec>] = &[
    spec("add", "binaryfunc"),
    spec("subtract", "binaryfunc"),
    spec("multiply", "binaryfunc"),
    spec("remainder", "binaryfunc"),
    spec("divmod", "binaryfunc"),
    spec("power", "ternaryfunc"),
    spec("negative", "unaryfunc"),
    spec("positive", "unaryfunc"),
    spec("absolute", "unaryfunc"),
    spec("bool", "inquiry"),
    spec("invert", "unaryfunc"),
    spec("lshift", "binaryfunc"),
    spec("rshift", "binaryfunc"),
    spec("and", "binaryfunc"),
    spec("xor", "binaryfunc"),
    spec("or", "binaryfunc"),
    spec("int", "unaryfunc"),
    // nb_reserved
    None,
    spec("float", "unaryfunc"),
    spec("inplace_add", "binaryfunc"),
    spec("inplace_subtract", "binaryfunc"),
    spec("inplace_multiply", "binaryfunc"),
    spec("inplace_remainder", "binaryfunc"),
    spec("inplace_power", "ternaryfunc"),
    spec("inplace_lshift", "binaryfunc"),
    spec("inplace_rshift", "binaryfunc"),
    spec("inplace_and", "binaryfunc"),
    spec("inplace_xor", "binaryfunc"),
    spec("inplace_or", "binaryfunc"),
    spec("floor_divide", "binaryfunc"),
    spec("true_divide", "binaryfunc"),
    spec("inplace_floor_divide", "binaryfunc"),
    spec("inplace_true_divide", "binaryfunc"),
    spec("index", "unaryfunc"),
    spec("matrix_multiply", "binaryfunc"),
    spec("inplace_matrix_multiply", "binaryfunc"),
];

const SEQUENCE_LAYOUT: &[Option<SlotSpec>] = &[
    spec("length", "lenfunc"),
    spec("concat", "binaryfunc"),
    spec("repeat", "ssizeargfunc"),
    spec("item", "ssizeargfunc"),
    // was_sq_slice
    None,
    spec("ass_item", "ssizeobjargproc"),
    // was_sq_ass_slice
    None,
    spec("contains", "objobjproc"),
    spec("inplace_concat", "binaryfunc"),
    spec("inplace_repeat", "ssizeargfunc"),
];

/// Type record overrides. Their placement inside `PyTypeObject` is decided by
/// the renderer, so this layout has no reserved entries.
const TYPE_RECORD_LAYOUT: &[Option<SlotSpec>] = &[
    spec("dealloc", "destructor"),
    spec("repr", "reprfunc"),
    spec("hash", "hashfunc"),
    spec("call", "ternaryfunc"),
    spec("str", "reprfunc"),
    spec("getattro", "getattrofunc"),
    spec("setattro", "setattrofunc"),
    spec("traverse", "traverseproc"),
    spec("clear", "inquiry"),
    spec("richcompare", "richcmpfunc"),
    spec("iter", "getiterfunc"),
    spec("iternext", "iternextfunc"),
    spec("base", "PyTypeObject *"),
    spec("init", "initproc"),
    spec("alloc", "allocfunc"),
    spec("new", "newfunc"),
    spec("free", "freefunc"),
    spec("del", "destructor"),
    spec("finalize", "destructor"),
];

/// ABI slot categories, one per two-letter prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotCategory {
    /// `am_*` -> `PyAsyncMethods`
    Async,
    /// `bf_*` -> `PyBufferProcs`
    Buffer,
    /// `mp_*` -> `PyMappingMethods`
    Mapping,
    /// `nb_*` -> `PyNumberMethods`
    Number,
    /// `sq_*` -> `PySequenceMethods`
    Sequence,
    /// `tp_*` -> fields of `PyTypeObject` itself
    TypeRecord,
}

impl SlotCategory {
    /// Every category, in the order their sub-tables are rendered
    pub const ALL: [Self; 6] = [
        Self::Async,
        Self::Buffer,
        Self::Mapping,
        Self::Number,
        Self::Sequence,
        Self::TypeRecord,
    ];

    /// Look up a category by its two-letter prefix
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.prefix() == prefix)
    }

    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Async => "am",
            Self::Buffer => "bf",
            Self::Mapping => "mp",
            Self::Number => "nb",
            Self::Sequence => "sq",
            Self::TypeRecord => "tp",
        }
    }

    /// ABI field layout of this category's table
    #[must_use]
    pub const fn layout(self) -> &'static [Option<SlotSpec>] {
        match self {
            Self::Async => ASYNC_LAYOUT,
            Self::Buffer => BUFFER_LAYOUT,
            Self::Mapping => MAPPING_LAYOUT,
            Self::Number => NUMBER_LAYOUT,
            Self::Sequence => SEQUENCE_LAYOUT,
            Self::TypeRecord => TYPE_RECORD_LAYOUT,
        }
    }

    /// Sub-table struct type and the type-record field that points at it.
    ///
    /// `None` for [`SlotCategory::TypeRecord`], whose slots live directly in
    /// the type record.
    #[must_use]
    pub const fn sub_table(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Async => Some(("PyAsyncMethods", "tp_as_async")),
            Self::Buffer => Some(("PyBufferProcs", "tp_as_buffer")),
            Self::Mapping => Some(("PyMappingMethods", "tp_as_mapping")),
            Self::Number => Some(("PyNumberMethods", "tp_as_number")),
            Self::Sequence => Some(("PySequenceMethods", "tp_as_sequence")),
            Self::TypeRecord => None,
        }
    }

    /// Find a slot of this category by name
    #[must_use]
    pub fn slot(self, name: &str) -> Option<Slot> {
        self.layout()
            .iter()
            .position(|entry| entry.is_some_and(|spec| spec.name == name))
            .map(|position| Slot {
                category: self,
                position,
            })
    }
}

impl fmt::Display for SlotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A validated slot: a category plus a position in its layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    category: SlotCategory,
    position: usize,
}

impl Slot {
    #[must_use]
    pub const fn category(self) -> SlotCategory {
        self.category
    }

    #[must_use]
    pub fn spec(self) -> Option<SlotSpec> {
        self.category
            .layout()
            .get(self.position)
            .copied()
            .flatten()
    }

    /// Full ABI name, e.g. `nb_add`
    #[must_use]
    pub fn abi_name(self) -> String {
        let name = self.spec().map_or("", |spec| spec.name);
        format!("{}_{name}", self.category.prefix())
    }
}

/// One optional function reference per known ABI slot.
///
/// A slot that is not overridden is `None` and renders as the neutral `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolSlots {
    async_slots: [Option<String>; ASYNC_LAYOUT.len()],
    buffer: [Option<String>; BUFFER_LAYOUT.len()],
    mapping: [Option<String>; MAPPING_LAYOUT.len()],
    number: [Option<String>; NUMBER_LAYOUT.len()],
    sequence: [Option<String>; SEQUENCE_LAYOUT.len()],
    type_record: [Option<String>; TYPE_RECORD_LAYOUT.len()],
}

impl Default for ProtocolSlots {
    fn default() -> Self {
        Self {
            async_slots: std::array::from_fn(|_| None),
            buffer: std::array::from_fn(|_| None),
            mapping: std::array::from_fn(|_| None),
            number: std::array::from_fn(|_| None),
            sequence: std::array::from_fn(|_| None),
            type_record: std::array::from_fn(|_| None),
        }
    }
}

impl ProtocolSlots {
    /// Slot references of one category, aligned with its layout
    #[must_use]
    pub fn category(&self, category: SlotCategory) -> &[Option<String>] {
        match category {
            SlotCategory::Async => &self.async_slots,
            SlotCategory::Buffer => &self.buffer,
            SlotCategory::Mapping => &self.mapping,
            SlotCategory::Number => &self.number,
            SlotCategory::Sequence => &self.sequence,
            SlotCategory::TypeRecord => &self.type_record,
        }
    }

    fn category_mut(&mut self, category: SlotCategory) -> &mut [Option<String>] {
        match category {
            SlotCategory::Async => &mut self.async_slots,
            SlotCategory::Buffer => &mut self.buffer,
            SlotCategory::Mapping => &mut self.mapping,
            SlotCategory::Number => &mut self.number,
            SlotCategory::Sequence => &mut self.sequence,
            SlotCategory::TypeRecord => &mut self.type_record,
        }
    }

    /// Point `slot` at `function`, returning the reference it replaced
    pub fn set(&mut self, slot: Slot, function: String) -> Option<String> {
        self.category_mut(slot.category)
            .get_mut(slot.position)
            .and_then(|entry| entry.replace(function))
    }

    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.category(slot.category)
            .get(slot.position)
            .and_then(Option::as_deref)
    }

    /// Look up an override by slot name within a category
    #[must_use]
    pub fn named(&self, category: SlotCategory, name: &str) -> Option<&str> {
        category.slot(name).and_then(|slot| self.get(slot))
    }

    /// Whether any slot of `category` is overridden
    #[must_use]
    pub fn any(&self, category: SlotCategory) -> bool {
        self.category(category).iter().any(Option::is_some)
    }
}
